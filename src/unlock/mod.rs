use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

use crate::db;

/// One directed edge of the admin-curated unlock graph: solving `prereq`
/// contributes one point toward unlocking `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockEdge {
    pub prereq_puzzle_id: i32,
    pub target_puzzle_id: i32,
}

/// A puzzle as the unlock computation sees it.
#[derive(Debug, Clone, Copy)]
pub struct UnlockNode {
    pub puzzle_id: i32,
    pub num_required_to_unlock: i32,
}

/// Compute every puzzle a team is entitled to have unlocked.
///
/// A puzzle unlocks once the number of its solved prerequisites reaches
/// `num_required_to_unlock`; puzzles requiring zero are always included.
/// The caller diffs the result against existing unlock rows, so repeated
/// runs are idempotent.
pub fn eligible_puzzles(
    puzzles: &[UnlockNode],
    edges: &[UnlockEdge],
    solved: &HashSet<i32>,
) -> Vec<i32> {
    let mut points: HashMap<i32, i32> = HashMap::new();
    for edge in edges {
        if solved.contains(&edge.prereq_puzzle_id) {
            *points.entry(edge.target_puzzle_id).or_insert(0) += 1;
        }
    }

    puzzles
        .iter()
        .filter(|p| points.get(&p.puzzle_id).copied().unwrap_or(0) >= p.num_required_to_unlock)
        .map(|p| p.puzzle_id)
        .collect()
}

/// Run the unlock step for one team and persist anything newly earned.
///
/// Returns the puzzle ids unlocked by this call (empty when nothing changed).
pub async fn recompute_team_unlocks(
    pool: &PgPool,
    hunt_id: i32,
    team_id: i64,
) -> sqlx::Result<Vec<i32>> {
    let puzzles = db::queries::list_puzzles(pool, hunt_id).await?;
    let edges = db::queries::list_unlock_edges(pool, hunt_id).await?;
    let solved = db::queries::solved_puzzle_ids(pool, team_id).await?;

    let nodes: Vec<UnlockNode> = puzzles
        .iter()
        .map(|p| UnlockNode {
            puzzle_id: p.puzzle_id,
            num_required_to_unlock: p.num_required_to_unlock,
        })
        .collect();

    let eligible = eligible_puzzles(&nodes, &edges, &solved);
    let already = db::queries::unlocked_puzzle_ids(pool, team_id).await?;

    let fresh: Vec<i32> = eligible
        .into_iter()
        .filter(|id| !already.contains(id))
        .collect();

    if !fresh.is_empty() {
        db::queries::insert_unlocks(pool, team_id, &fresh).await?;
        tracing::info!(
            "unlocked {} new puzzle(s) for team {}: {:?}",
            fresh.len(),
            team_id,
            fresh
        );
    }

    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(puzzle_id: i32, required: i32) -> UnlockNode {
        UnlockNode {
            puzzle_id,
            num_required_to_unlock: required,
        }
    }

    fn edge(prereq: i32, target: i32) -> UnlockEdge {
        UnlockEdge {
            prereq_puzzle_id: prereq,
            target_puzzle_id: target,
        }
    }

    #[test]
    fn test_zero_requirement_puzzles_always_unlock() {
        let puzzles = vec![node(1, 0), node(2, 1)];
        let edges = vec![edge(1, 2)];
        let solved = HashSet::new();

        let unlocked = eligible_puzzles(&puzzles, &edges, &solved);
        assert_eq!(unlocked, vec![1]);
    }

    #[test]
    fn test_single_prerequisite_unlocks_target() {
        let puzzles = vec![node(1, 0), node(2, 1)];
        let edges = vec![edge(1, 2)];
        let solved: HashSet<i32> = [1].into_iter().collect();

        let unlocked = eligible_puzzles(&puzzles, &edges, &solved);
        assert_eq!(unlocked, vec![1, 2]);
    }

    #[test]
    fn test_threshold_requires_enough_solved_prereqs() {
        // Puzzle 4 needs any two of puzzles 1-3.
        let puzzles = vec![node(1, 0), node(2, 0), node(3, 0), node(4, 2)];
        let edges = vec![edge(1, 4), edge(2, 4), edge(3, 4)];

        let one_solved: HashSet<i32> = [1].into_iter().collect();
        assert!(!eligible_puzzles(&puzzles, &edges, &one_solved).contains(&4));

        let two_solved: HashSet<i32> = [1, 3].into_iter().collect();
        assert!(eligible_puzzles(&puzzles, &edges, &two_solved).contains(&4));
    }

    #[test]
    fn test_unsolved_prereqs_contribute_nothing() {
        let puzzles = vec![node(1, 0), node(2, 1), node(3, 1)];
        let edges = vec![edge(1, 2), edge(2, 3)];
        let solved: HashSet<i32> = [1].into_iter().collect();

        let unlocked = eligible_puzzles(&puzzles, &edges, &solved);
        // Puzzle 3 stays locked: puzzle 2 is merely unlocked, not solved.
        assert_eq!(unlocked, vec![1, 2]);
    }

    #[test]
    fn test_diamond_graph_counts_each_solved_prereq_once() {
        // 1 and 2 both feed 3; 3 needs both.
        let puzzles = vec![node(1, 0), node(2, 0), node(3, 2)];
        let edges = vec![edge(1, 3), edge(2, 3)];

        let solved: HashSet<i32> = [1, 2].into_iter().collect();
        let unlocked = eligible_puzzles(&puzzles, &edges, &solved);
        assert!(unlocked.contains(&3));
    }

    #[test]
    fn test_computation_is_idempotent() {
        let puzzles = vec![node(1, 0), node(2, 1)];
        let edges = vec![edge(1, 2)];
        let solved: HashSet<i32> = [1].into_iter().collect();

        let first = eligible_puzzles(&puzzles, &edges, &solved);
        let second = eligible_puzzles(&puzzles, &edges, &solved);
        assert_eq!(first, second);
    }

    #[test]
    fn test_solved_puzzles_remain_eligible() {
        // Already-solved puzzles stay in the eligible set; the insert layer
        // deduplicates against existing unlock rows.
        let puzzles = vec![node(1, 0), node(2, 1)];
        let edges = vec![edge(1, 2)];
        let solved: HashSet<i32> = [1, 2].into_iter().collect();

        let unlocked = eligible_puzzles(&puzzles, &edges, &solved);
        assert_eq!(unlocked, vec![1, 2]);
    }

    #[test]
    fn test_empty_graph() {
        let unlocked = eligible_puzzles(&[], &[], &HashSet::new());
        assert!(unlocked.is_empty());
    }
}
