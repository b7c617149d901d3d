use serde::{Deserialize, Serialize};

use super::Team;

/// A team with its 1-based leaderboard position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub position: usize,
    #[serde(flatten)]
    pub team: Team,
}

/// Order teams by score, highest first. Ties keep their input order.
pub fn rank_teams(teams: &[Team]) -> Vec<RatingEntry> {
    let mut sorted: Vec<&Team> = teams.iter().collect();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, team)| RatingEntry {
            position: i + 1,
            team: team.clone(),
        })
        .collect()
}

/// Points a team still needs to reach the position above it, if any.
pub fn gap_to_next(rating: &[RatingEntry], team_id: i64) -> Option<i64> {
    let idx = rating.iter().position(|e| e.team.id == team_id)?;
    if idx == 0 {
        return None;
    }
    Some(rating[idx - 1].team.score - rating[idx].team.score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: i64, score: i64) -> Team {
        Team {
            id,
            code: format!("TEAM{:02}", id),
            name: format!("Team {}", id),
            score,
            color: None,
            members: 3,
        }
    }

    #[test]
    fn test_rank_teams_non_increasing() {
        let teams = vec![team(1, 100), team(2, 300), team(3, 200)];
        let rating = rank_teams(&teams);
        let ids: Vec<i64> = rating.iter().map(|e| e.team.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(rating.windows(2).all(|w| w[0].team.score >= w[1].team.score));
        let positions: Vec<usize> = rating.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_rank_teams_stable_on_ties() {
        let teams = vec![team(1, 50), team(2, 80), team(3, 50), team(4, 80), team(5, 50)];
        let ids: Vec<i64> = rank_teams(&teams).iter().map(|e| e.team.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_rank_teams_empty() {
        assert!(rank_teams(&[]).is_empty());
    }

    #[test]
    fn test_gap_to_next() {
        let rating = rank_teams(&[team(1, 100), team(2, 300), team(3, 200)]);
        assert_eq!(gap_to_next(&rating, 2), None);
        assert_eq!(gap_to_next(&rating, 3), Some(100));
        assert_eq!(gap_to_next(&rating, 1), Some(100));
        assert_eq!(gap_to_next(&rating, 9), None);
    }

    #[test]
    fn test_rating_entry_flattens_team() {
        let entry = RatingEntry { position: 1, team: team(2, 300) };
        let value = serde_json::to_value(&entry).expect("entry serializes");
        assert_eq!(value["position"], 1);
        assert_eq!(value["score"], 300);
        assert_eq!(value["code"], "TEAM02");
    }
}
