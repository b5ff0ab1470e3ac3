//! penalty scoring and results export.
//!
//! one row per crew, no cross-crew ranking: ordering the results is the
//! consumer's job.

use std::collections::HashMap;
use std::io::Write;

use chrono::NaiveTime;
use diesel::pg::PgConnection;
use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, Error};
use crate::modules::helpers::parsing::Parsing;
use crate::modules::models::checkpoint::Checkpoint;
use crate::modules::models::crew::Crew;
use crate::modules::models::ideal_time::IdealTime;
use crate::modules::models::scan::ScanRecord;

/// per-checkpoint deviation penalty cap
pub const MAX_CHECKPOINT_PENALTY: i32 = 100;
/// penalty points per whole minute of deviation
pub const PENALTY_PER_MINUTE: i32 = 10;

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct CheckpointScore {
    pub checkpoint_id: i32,
    pub ideal: Option<NaiveTime>,
    pub actual: Option<NaiveTime>,
    pub penalty: i32,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct CrewResultRow {
    pub number: String,
    pub name: String,
    pub vehicle: String,
    pub category: String,
    pub vehicle_year: i32,
    pub penalty_year: i32,
    pub checkpoints: Vec<CheckpointScore>,
    pub total_penalty: i32,
}

/// # whole minutes of deviation between ideal and actual
/// floor of the absolute difference in seconds-of-day over 60; 59 seconds
/// late is still zero minutes.
pub fn deviation_minutes(ideal: NaiveTime, actual: NaiveTime) -> i64 {
    (actual - ideal).num_seconds().abs() / 60
}

/// # penalty for one (crew, checkpoint) pair
/// ten points per whole minute of deviation, capped at 100. a missing ideal
/// or actual time is a full miss and scores the cap outright.
pub fn checkpoint_penalty(ideal: Option<NaiveTime>, actual: Option<NaiveTime>) -> i32 {
    match (ideal, actual) {
        (Some(ideal), Some(actual)) => {
            let minutes = deviation_minutes(ideal, actual);
            (minutes as i32).saturating_mul(PENALTY_PER_MINUTE).min(MAX_CHECKPOINT_PENALTY)
        }
        _ => MAX_CHECKPOINT_PENALTY,
    }
}

/// # score every crew of a race from materialized maps
/// pure: takes the ideal and earliest-scan maps keyed by
/// (crew id, checkpoint id) and produces one row per crew, checkpoints in
/// route order. the crew's manufacture-year penalty is coerced with
/// `safe_int` and added to the total.
pub fn score_crews(
    crews: &[Crew],
    checkpoints: &[Checkpoint],
    ideal_map: &HashMap<(i32, i32), NaiveTime>,
    scan_map: &HashMap<(i32, i32), NaiveTime>,
) -> Vec<CrewResultRow> {
    crews
        .iter()
        .map(|crew| {
            let penalty_year = Parsing::safe_int(crew.penalty_year.as_deref());

            let scores: Vec<CheckpointScore> = checkpoints
                .iter()
                .map(|checkpoint| {
                    let key = (crew.id, checkpoint.id);
                    let ideal = ideal_map.get(&key).copied();
                    let actual = scan_map.get(&key).copied();

                    CheckpointScore {
                        checkpoint_id: checkpoint.id,
                        ideal,
                        actual,
                        penalty: checkpoint_penalty(ideal, actual),
                    }
                })
                .collect();

            let total_penalty: i32 =
                scores.iter().map(|score| score.penalty).sum::<i32>() + penalty_year;

            CrewResultRow {
                number: crew.number.clone(),
                name: crew.name.clone(),
                vehicle: crew.vehicle.clone(),
                category: crew.category.clone().unwrap_or_default(),
                vehicle_year: Parsing::safe_int(crew.vehicle_year.as_deref()),
                penalty_year,
                checkpoints: scores,
                total_penalty,
            }
        })
        .collect()
}

/// # build the scored result rows of a race
/// joins the ideal-time cache against the earliest scan per pair.
///
/// ## Arguments
/// * `conn` - the database connection
/// * `race_id_in` - the race to score
///
/// ## Returns
/// * the race's checkpoints in route order plus one scored row per crew
pub fn build_result_rows(
    conn: &mut PgConnection,
    race_id_in: i32,
) -> CustomResult<(Vec<Checkpoint>, Vec<CrewResultRow>)> {
    let checkpoints = Checkpoint::for_race(conn, race_id_in)?;
    let crews = Crew::for_race(conn, race_id_in)?;
    let crew_ids: Vec<i32> = crews.iter().map(|crew| crew.id).collect();

    let ideal_map: HashMap<(i32, i32), NaiveTime> = IdealTime::for_crews(conn, &crew_ids)?
        .into_iter()
        .map(|row| ((row.crew_id, row.checkpoint_id), row.ideal_time))
        .collect();

    // scans come back earliest first; first insert per key wins
    let mut scan_map: HashMap<(i32, i32), NaiveTime> = HashMap::new();
    for scan in ScanRecord::for_crews(conn, &crew_ids)? {
        scan_map
            .entry((scan.crew_id, scan.checkpoint_id))
            .or_insert_with(|| scan.timestamp.time());
    }

    Ok((checkpoints.clone(), score_crews(&crews, &checkpoints, &ideal_map, &scan_map)))
}

/// # write the results as a csv table
/// columns: identity fields, then one (ideal, actual, points) triple per
/// checkpoint in route order, then the total.
pub fn write_results_csv<W: Write>(
    writer: W,
    checkpoints: &[Checkpoint],
    rows: &[CrewResultRow],
) -> CustomResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut headers = vec![
        "number".to_string(),
        "name".to_string(),
        "vehicle".to_string(),
        "category".to_string(),
        "vehicle_year".to_string(),
        "penalty_year_points".to_string(),
    ];
    for checkpoint in checkpoints {
        headers.push(format!("{} - ideal", checkpoint.name));
        headers.push(format!("{} - actual", checkpoint.name));
        headers.push(format!("{} - points", checkpoint.name));
    }
    headers.push("total_points".to_string());

    csv_writer
        .write_record(&headers)
        .map_err(|error| Error::ExportError {
            message: error.to_string(),
        })?;

    for row in rows {
        let mut record = vec![
            row.number.clone(),
            row.name.clone(),
            row.vehicle.clone(),
            row.category.clone(),
            row.vehicle_year.to_string(),
            row.penalty_year.to_string(),
        ];
        for score in &row.checkpoints {
            record.push(format_time(score.ideal));
            record.push(format_time(score.actual));
            record.push(score.penalty.to_string());
        }
        record.push(row.total_penalty.to_string());

        csv_writer
            .write_record(&record)
            .map_err(|error| Error::ExportError {
                message: error.to_string(),
            })?;
    }

    csv_writer.flush().map_err(|error| Error::ExportError {
        message: error.to_string(),
    })?;

    Ok(())
}

fn format_time(time: Option<NaiveTime>) -> String {
    match time {
        Some(time) => time.format("%H:%M").to_string(),
        None => "-".to_string(),
    }
}

/**************************************************************************************************/
/**************** TESTS ***************************************************************************/
/**************************************************************************************************/

#[cfg(test)]
mod tests {
    use super::*;

    fn time(value: &str) -> NaiveTime {
        NaiveTime::parse_from_str(value, "%H:%M:%S").unwrap()
    }

    fn crew(id: i32, number: &str, penalty_year: Option<&str>) -> Crew {
        Crew {
            id,
            number: number.to_string(),
            name: format!("Crew {}", number),
            vehicle: "Tatra 57".to_string(),
            race_id: 1,
            is_active: true,
            qr_code_url: None,
            category: Some("pre-war".to_string()),
            vehicle_year: Some("1931".to_string()),
            penalty_year: penalty_year.map(str::to_string),
        }
    }

    fn checkpoint(id: i32, position: i32) -> Checkpoint {
        Checkpoint {
            id,
            name: format!("CK {}", position),
            position,
            race_id: 1,
        }
    }

    #[test]
    fn seven_minutes_late_scores_seventy() {
        // scanned 09:07:00 against ideal 09:00:00
        let penalty = checkpoint_penalty(Some(time("09:00:00")), Some(time("09:07:00")));
        assert_eq!(penalty, 70);
    }

    #[test]
    fn deviation_floors_to_whole_minutes() {
        assert_eq!(deviation_minutes(time("09:00:00"), time("09:00:59")), 0);
        assert_eq!(deviation_minutes(time("09:00:00"), time("09:01:00")), 1);
        assert_eq!(deviation_minutes(time("09:05:00"), time("09:00:00")), 5);
    }

    #[test]
    fn early_and_late_deviations_score_alike() {
        let late = checkpoint_penalty(Some(time("09:00:00")), Some(time("09:03:00")));
        let early = checkpoint_penalty(Some(time("09:00:00")), Some(time("08:57:00")));
        assert_eq!(late, early);
        assert_eq!(late, 30);
    }

    #[test]
    fn penalty_is_monotone_and_capped() {
        let ideal = time("09:00:00");
        let mut previous = 0;
        for minutes in 0..30 {
            let actual = time("09:00:00") + chrono::Duration::minutes(minutes);
            let penalty = checkpoint_penalty(Some(ideal), Some(actual));
            assert!(penalty >= previous);
            assert!(penalty <= MAX_CHECKPOINT_PENALTY);
            previous = penalty;
        }
        assert_eq!(previous, MAX_CHECKPOINT_PENALTY);
    }

    #[test]
    fn missing_scan_or_schedule_is_a_full_miss() {
        assert_eq!(checkpoint_penalty(Some(time("09:00:00")), None), 100);
        assert_eq!(checkpoint_penalty(None, Some(time("09:00:00"))), 100);
        assert_eq!(checkpoint_penalty(None, None), 100);
    }

    #[test]
    fn score_crews_sums_penalties_and_year_points() {
        let crews = vec![crew(1, "1", Some("15"))];
        let checkpoints = vec![checkpoint(10, 1), checkpoint(11, 2)];

        let mut ideal_map = HashMap::new();
        ideal_map.insert((1, 10), time("09:00:00"));
        ideal_map.insert((1, 11), time("09:30:00"));

        let mut scan_map = HashMap::new();
        scan_map.insert((1, 10), time("09:02:00"));
        // checkpoint 11 never scanned

        let rows = score_crews(&crews, &checkpoints, &ideal_map, &scan_map);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.checkpoints[0].penalty, 20);
        assert_eq!(row.checkpoints[1].penalty, 100);
        assert_eq!(row.penalty_year, 15);
        assert_eq!(row.total_penalty, 135);
        assert_eq!(row.vehicle_year, 1931);
    }

    #[test]
    fn score_crews_treats_malformed_year_fields_as_zero() {
        let crews = vec![crew(1, "1", Some("nan"))];
        let checkpoints = vec![checkpoint(10, 1)];

        let rows = score_crews(&crews, &checkpoints, &HashMap::new(), &HashMap::new());
        assert_eq!(rows[0].penalty_year, 0);
        assert_eq!(rows[0].total_penalty, 100);
    }

    #[test]
    fn csv_layout_has_a_triple_per_checkpoint() {
        let crews = vec![crew(1, "1", Some("5"))];
        let checkpoints = vec![checkpoint(10, 1), checkpoint(11, 2)];

        let mut ideal_map = HashMap::new();
        ideal_map.insert((1, 10), time("09:00:00"));
        let mut scan_map = HashMap::new();
        scan_map.insert((1, 10), time("09:07:00"));

        let rows = score_crews(&crews, &checkpoints, &ideal_map, &scan_map);

        let mut buffer = Vec::new();
        write_results_csv(&mut buffer, &checkpoints, &rows).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        let mut lines = output.lines();

        assert_eq!(
            lines.next().unwrap(),
            "number,name,vehicle,category,vehicle_year,penalty_year_points,\
             CK 1 - ideal,CK 1 - actual,CK 1 - points,\
             CK 2 - ideal,CK 2 - actual,CK 2 - points,total_points"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,Crew 1,Tatra 57,pre-war,1931,5,09:00,09:07,70,-,-,100,175"
        );
    }
}
