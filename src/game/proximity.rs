//! Neighbor computation over the active team set

use crate::geo::distance_meters;
use crate::store::Team;
use crate::ws::protocol::NearbyTeam;

/// Default neighbor / elimination radius in meters
pub const DEFAULT_THRESHOLD_METERS: f64 = 10.0;

/// One team and the teams currently within range of it
#[derive(Debug, Clone)]
pub struct Neighborhood {
    pub team_name: String,
    pub nearby: Vec<NearbyTeam>,
}

/// Boundary-inclusive range check
pub fn within_threshold(distance: f64, threshold: f64) -> bool {
    distance <= threshold
}

/// Teams from `others` within `threshold` meters of `origin`.
///
/// The origin itself and teams that never reported a location are skipped.
pub fn nearby_from(origin: &Team, others: &[Team], threshold: f64) -> Vec<NearbyTeam> {
    let Some(origin_at) = origin.coordinate() else {
        return Vec::new();
    };

    others
        .iter()
        .filter(|other| other.team_name != origin.team_name)
        .filter_map(|other| {
            let location = other.location?;
            let distance = distance_meters(origin_at, location.coordinate());
            within_threshold(distance, threshold).then(|| NearbyTeam {
                team_name: other.team_name.clone(),
                location,
                distance,
            })
        })
        .collect()
}

/// Neighborhoods for every located team, in input order.
///
/// Plain pairwise scan: O(n²) in active teams, which stays cheap at the team
/// counts a single game session has.
pub fn nearby_for(all_active: &[Team], threshold: f64) -> Vec<Neighborhood> {
    all_active
        .iter()
        .filter(|team| team.location.is_some())
        .map(|team| Neighborhood {
            team_name: team.team_name.clone(),
            nearby: nearby_from(team, all_active, threshold),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::store::Location;
    use chrono::Utc;

    fn team(name: &str, latitude: f64, longitude: f64) -> Team {
        Team {
            team_name: name.to_string(),
            location: Some(Location::new(Coordinate::new(latitude, longitude), Utc::now())),
            active: true,
        }
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        assert!(within_threshold(10.0, DEFAULT_THRESHOLD_METERS));
        assert!(!within_threshold(10.0001, DEFAULT_THRESHOLD_METERS));
    }

    #[test]
    fn pair_at_exact_threshold_distance_is_included() {
        let red = team("Red", 40.0, -75.0);
        let blue = team("Blue", 40.00009, -75.0);
        let exact = distance_meters(red.coordinate().unwrap(), blue.coordinate().unwrap());
        let teams = [red, blue];

        assert_eq!(nearby_from(&teams[0], &teams, exact).len(), 1);
        assert!(nearby_from(&teams[0], &teams, exact - 1e-4).is_empty());
    }

    #[test]
    fn red_and_blue_see_each_other_at_five_and_a_half_meters() {
        let teams = vec![team("Red", 40.0, -75.0), team("Blue", 40.00005, -75.0)];
        let hoods = nearby_for(&teams, DEFAULT_THRESHOLD_METERS);

        assert_eq!(hoods.len(), 2);
        for (hood, other) in hoods.iter().zip(["Blue", "Red"]) {
            assert_eq!(hood.nearby.len(), 1);
            assert_eq!(hood.nearby[0].team_name, other);
            let d = hood.nearby[0].distance;
            assert!((d - 5.56).abs() / 5.56 < 0.05, "got {d}");
        }
    }

    #[test]
    fn distant_and_unlocated_teams_are_excluded() {
        let mut ghost = team("Ghost", 40.0, -75.0);
        ghost.location = None;
        let teams = vec![team("Red", 40.0, -75.0), team("Far", 40.01, -75.0), ghost];

        let hoods = nearby_for(&teams, DEFAULT_THRESHOLD_METERS);
        assert_eq!(hoods.len(), 2, "teams without a location get no neighborhood");
        assert!(hoods.iter().all(|h| h.nearby.is_empty()));
    }

    #[test]
    fn output_order_follows_input() {
        let teams = vec![
            team("A", 40.0, -75.0),
            team("B", 40.00001, -75.0),
            team("C", 40.00002, -75.0),
        ];
        let hoods = nearby_for(&teams, DEFAULT_THRESHOLD_METERS);
        let names: Vec<_> = hoods.iter().map(|h| h.team_name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        let a_neighbors: Vec<_> = hoods[0].nearby.iter().map(|n| n.team_name.as_str()).collect();
        assert_eq!(a_neighbors, ["B", "C"]);
    }
}
