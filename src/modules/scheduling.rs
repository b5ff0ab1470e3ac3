//! the ideal-time scheduling core.
//!
//! two fan-out flows live here and they are deliberately not unified:
//!
//! * [`recalculate_ideal_times`] rebuilds a race schedule from the reference
//!   crew's existing rows, considers only active crews with numeric bibs and
//!   staggers by the race's configured `crew_interval`.
//! * [`setup_ideal_times`] seeds the schedule from operator input, takes every
//!   crew of the race and staggers by a flat one minute per position.
//!
//! the asymmetry is inherited from the operational rules of the rally, so
//! do not "fix" it by merging the two.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_query;
use log::info;

use crate::errors::{CustomResult, Error};
use crate::modules::helpers::parsing::Parsing;
use crate::modules::helpers::time::TimeHelper;
use crate::modules::models::checkpoint::Checkpoint;
use crate::modules::models::crew::Crew;
use crate::modules::models::ideal_time::{IdealTime, NewIdealTime};
use crate::modules::models::race::Race;

/**************************************************************************************************/
/**************** RECALCULATION ENGINE ************************************************************/
/**************************************************************************************************/

/// # rebuild the full ideal-time schedule of a race
/// must be called synchronously after every crew insert, delete, bib edit or
/// active toggle. the whole wipe-and-repopulate runs in one transaction,
/// serialized per race with an advisory lock, so readers never observe a
/// half-built schedule.
///
/// a race with no eligible reference crew, or a reference crew without
/// schedule rows, is a silent no-op: a brand-new race has nothing to
/// propagate and that is a valid state, not an error.
///
/// ## Arguments
/// * `conn` - the database connection
/// * `race_id_in` - the race whose schedule changed
pub fn recalculate_ideal_times(conn: &mut PgConnection, race_id_in: i32) -> CustomResult<()> {
    let race = match Race::get_by_id(conn, race_id_in) {
        Ok(race) => race,
        Err(diesel::result::Error::NotFound) => return Ok(()),
        Err(error) => return Err(error.into()),
    };

    let checkpoints = Checkpoint::for_race(conn, race.id)?;
    let crews = Crew::for_race(conn, race.id)?;

    let active = active_ordering(&crews);
    let reference = match active.first() {
        Some(reference) => *reference,
        None => return Ok(()),
    };

    let checkpoint_ids: Vec<i32> = checkpoints.iter().map(|ck| ck.id).collect();
    let base_times = IdealTime::for_crew_in_checkpoints(conn, reference.id, &checkpoint_ids)?;
    if base_times.is_empty() {
        return Ok(());
    }

    let rows = staggered_rows(&active, &base_times, race.base_date(), race.crew_interval);

    // full-race wipe: inactive and non-numeric crews lose their rows too
    let crew_ids: Vec<i32> = crews.iter().map(|crew| crew.id).collect();
    conn.transaction::<_, Error, _>(|conn| {
        lock_race_schedule(conn, race.id)?;
        IdealTime::delete_for_crews(conn, &crew_ids)?;
        IdealTime::insert_many(conn, &rows)?;

        Ok(())
    })?;

    info!(
        target: "scheduling:recalculate",
        "rebuilt {} ideal times for race {} from crew \"{}\"",
        rows.len(),
        race.id,
        reference.number
    );

    Ok(())
}

/// # the active ordering of a race's crews
/// active crews with an all-digit bib, ascending by bib value. a crew's
/// index in this slice is its stagger position. duplicate bib values order
/// by crew id so the result does not depend on store iteration order.
pub fn active_ordering(crews: &[Crew]) -> Vec<&Crew> {
    let mut ordered: Vec<(i64, &Crew)> = crews
        .iter()
        .filter(|crew| crew.is_active)
        .filter_map(|crew| crew.bib_value().map(|value| (value, crew)))
        .collect();

    ordered.sort_by_key(|(value, crew)| (*value, crew.id));

    ordered.into_iter().map(|(_, crew)| crew).collect()
}

/// # fan a reference schedule out across the active ordering
/// every crew gets one row per reference row, shifted by
/// `position * interval_minutes`. position 0 is the reference crew itself,
/// so rerunning this on unchanged input reproduces the reference rows
/// exactly.
pub fn staggered_rows(
    active: &[&Crew],
    base_times: &[IdealTime],
    base_date: NaiveDate,
    interval_minutes: i32,
) -> Vec<NewIdealTime> {
    let mut rows = Vec::with_capacity(active.len() * base_times.len());

    for (position, crew) in active.iter().enumerate() {
        let offset = position as i64 * interval_minutes as i64;
        for base in base_times {
            let shifted =
                TimeHelper::add_minutes(TimeHelper::combine(base_date, base.ideal_time), offset);

            rows.push(NewIdealTime {
                crew_id: crew.id,
                checkpoint_id: base.checkpoint_id,
                ideal_time: shifted.time(),
            });
        }
    }

    rows
}

/**************************************************************************************************/
/**************** MANUAL SCHEDULE SETUP ***********************************************************/
/**************************************************************************************************/

/// # seed a race schedule from operator input
/// the form carries `start_time` as HH:MM, one `interval_<from>_<to>` MM:SS
/// entry per adjacent checkpoint pair and optional `name_<id>` checkpoint
/// renames. validation failures identify the offending field and leave the
/// store untouched.
///
/// this flow orders ALL crews of the race by bib, active or not, and
/// staggers a flat minute per position regardless of the race's configured
/// interval (see the module docs).
///
/// ## Arguments
/// * `conn` - the database connection
/// * `race_id_in` - the race to seed
/// * `form` - raw form fields of the setup request
pub fn setup_ideal_times(
    conn: &mut PgConnection,
    race_id_in: i32,
    form: &HashMap<String, String>,
) -> CustomResult<()> {
    let race = Race::get_by_id(conn, race_id_in)?;
    let checkpoints = Checkpoint::for_race(conn, race.id)?;
    let crews = Crew::for_race(conn, race.id)?;

    let start_raw = match form.get("start_time").map(|raw| raw.trim()) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(Error::schedule_input("missing start time")),
    };
    let start = match Parsing::parse_clock(start_raw) {
        Some(start) => start,
        None => {
            return Err(Error::schedule_input(format!(
                "invalid start time \"{}\", expected HH:MM",
                start_raw
            )))
        }
    };

    let intervals = parse_intervals(&checkpoints, form)?;
    let ordered = numeric_ordering(&crews)?;

    let times = checkpoint_times(TimeHelper::combine(race.base_date(), start), &intervals);
    let rows = flat_stagger_rows(&ordered, &checkpoints, &times);

    let crew_ids: Vec<i32> = crews.iter().map(|crew| crew.id).collect();
    let checkpoint_ids: Vec<i32> = checkpoints.iter().map(|ck| ck.id).collect();

    conn.transaction::<_, Error, _>(|conn| {
        lock_race_schedule(conn, race.id)?;
        IdealTime::delete_for_crews_and_checkpoints(conn, &crew_ids, &checkpoint_ids)?;
        IdealTime::insert_many(conn, &rows)?;

        // checkpoint renames ride along in the same request
        for checkpoint in &checkpoints {
            if let Some(new_name) = form.get(&format!("name_{}", checkpoint.id)) {
                if !new_name.trim().is_empty() {
                    Checkpoint::rename(conn, checkpoint.id, new_name.trim())?;
                }
            }
        }

        Ok(())
    })?;

    info!(
        target: "scheduling:setup",
        "seeded {} ideal times for race {}",
        rows.len(),
        race.id
    );

    Ok(())
}

/// # collect the adjacent-pair intervals from the form
/// one `interval_<from>_<to>` key per adjacent checkpoint pair in route
/// order; a missing or malformed entry fails the whole request naming both
/// checkpoints.
pub fn parse_intervals(
    checkpoints: &[Checkpoint],
    form: &HashMap<String, String>,
) -> CustomResult<Vec<Duration>> {
    let mut intervals = Vec::new();

    for pair in checkpoints.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        let key = format!("interval_{}_{}", from.id, to.id);

        let raw = match form.get(&key).map(|raw| raw.trim()) {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                return Err(Error::schedule_input(format!(
                    "missing interval between {} and {}",
                    from.name, to.name
                )))
            }
        };

        match Parsing::parse_interval(raw) {
            Some(interval) => intervals.push(interval),
            None => {
                return Err(Error::schedule_input(format!(
                    "invalid interval between {} and {}: \"{}\", expected MM:SS",
                    from.name, to.name, raw
                )))
            }
        }
    }

    Ok(intervals)
}

/// # every crew of the race ordered by bib value
/// the manual flow has no exclusion rule, so a non-numeric bib cannot be
/// ordered and fails the request instead of being skipped.
pub fn numeric_ordering(crews: &[Crew]) -> CustomResult<Vec<&Crew>> {
    let mut ordered = Vec::with_capacity(crews.len());
    for crew in crews {
        match crew.bib_value() {
            Some(value) => ordered.push((value, crew)),
            None => {
                return Err(Error::schedule_input(format!(
                    "crew \"{}\" has a non-numeric bib number \"{}\"",
                    crew.name, crew.number
                )))
            }
        }
    }

    ordered.sort_by_key(|(value, crew)| (*value, crew.id));

    Ok(ordered.into_iter().map(|(_, crew)| crew).collect())
}

/// # the reference checkpoint times
/// successive addition of each interval to the previous checkpoint's time,
/// starting from the supplied start timestamp.
pub fn checkpoint_times(start: NaiveDateTime, intervals: &[Duration]) -> Vec<NaiveDateTime> {
    let mut times = Vec::with_capacity(intervals.len() + 1);
    times.push(start);
    for interval in intervals {
        let last = *times.last().unwrap_or(&start);
        times.push(last + *interval);
    }

    times
}

/// # fan the reference checkpoint times out across all crews
/// flat one minute of stagger per position in the ordering.
pub fn flat_stagger_rows(
    ordered: &[&Crew],
    checkpoints: &[Checkpoint],
    times: &[NaiveDateTime],
) -> Vec<NewIdealTime> {
    let mut rows = Vec::with_capacity(ordered.len() * checkpoints.len());

    for (position, crew) in ordered.iter().enumerate() {
        for (checkpoint, time) in checkpoints.iter().zip(times.iter()) {
            let shifted = TimeHelper::add_minutes(*time, position as i64);

            rows.push(NewIdealTime {
                crew_id: crew.id,
                checkpoint_id: checkpoint.id,
                ideal_time: shifted.time(),
            });
        }
    }

    rows
}

/// two concurrent rebuilds of one race would interleave their
/// delete-then-insert and leave a mixed schedule; the advisory lock
/// serializes them for the duration of the transaction.
fn lock_race_schedule(conn: &mut PgConnection, race_id_in: i32) -> QueryResult<()> {
    sql_query(format!("SELECT pg_advisory_xact_lock({})", race_id_in)).execute(conn)?;

    Ok(())
}

/**************************************************************************************************/
/**************** TESTS ***************************************************************************/
/**************************************************************************************************/

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn crew(id: i32, number: &str, is_active: bool) -> Crew {
        Crew {
            id,
            number: number.to_string(),
            name: format!("Crew {}", number),
            vehicle: "Praga Piccolo".to_string(),
            race_id: 1,
            is_active,
            qr_code_url: None,
            category: None,
            vehicle_year: None,
            penalty_year: None,
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

    fn ideal(checkpoint_id: i32, time: &str) -> IdealTime {
        IdealTime {
            id: checkpoint_id,
            crew_id: 1,
            checkpoint_id,
            ideal_time: NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn times_of(rows: &[NewIdealTime], crew_id: i32) -> Vec<(i32, NaiveTime)> {
        rows.iter()
            .filter(|row| row.crew_id == crew_id)
            .map(|row| (row.checkpoint_id, row.ideal_time))
            .collect()
    }

    #[test]
    fn active_ordering_filters_and_sorts_by_bib_value() {
        let crews = vec![
            crew(1, "12", true),
            crew(2, "3", true),
            crew(3, "A7", true),  // non-numeric bib
            crew(4, "1", false), // inactive
            crew(5, "07", true),
        ];

        let ordered: Vec<i32> = active_ordering(&crews).iter().map(|c| c.id).collect();
        // "07" sorts as 7, before 12; inactive and non-numeric are gone
        assert_eq!(ordered, vec![2, 5, 1]);
    }

    #[test]
    fn active_ordering_breaks_bib_ties_by_crew_id() {
        let crews = vec![crew(9, "5", true), crew(2, "5", true), crew(4, "5", true)];

        let ordered: Vec<i32> = active_ordering(&crews).iter().map(|c| c.id).collect();
        assert_eq!(ordered, vec![2, 4, 9]);
    }

    #[test]
    fn staggered_rows_apply_position_times_interval() {
        // race with stagger 5, crews 1/2/3, reference at 09:00:00
        let crews = vec![crew(1, "1", true), crew(2, "2", true), crew(3, "3", true)];
        let active = active_ordering(&crews);
        let base = vec![ideal(10, "09:00:00")];

        let rows = staggered_rows(&active, &base, date(), 5);

        assert_eq!(rows.len(), 3);
        assert_eq!(
            times_of(&rows, 1),
            vec![(10, NaiveTime::from_hms_opt(9, 0, 0).unwrap())]
        );
        assert_eq!(
            times_of(&rows, 2),
            vec![(10, NaiveTime::from_hms_opt(9, 5, 0).unwrap())]
        );
        assert_eq!(
            times_of(&rows, 3),
            vec![(10, NaiveTime::from_hms_opt(9, 10, 0).unwrap())]
        );
    }

    #[test]
    fn staggered_rows_hold_the_stagger_invariant_per_checkpoint() {
        let crews: Vec<Crew> = (1..=6).map(|n| crew(n, &n.to_string(), true)).collect();
        let active = active_ordering(&crews);
        let base = vec![ideal(10, "08:15:00"), ideal(11, "08:40:30"), ideal(12, "09:02:00")];

        let interval = 4;
        let rows = staggered_rows(&active, &base, date(), interval);

        let reference = times_of(&rows, 1);
        for (position, crew) in active.iter().enumerate() {
            for ((ck, time), (ref_ck, ref_time)) in
                times_of(&rows, crew.id).iter().zip(reference.iter())
            {
                assert_eq!(ck, ref_ck);
                let delta = *time - *ref_time;
                assert_eq!(delta, Duration::minutes(position as i64 * interval as i64));
            }
        }
    }

    #[test]
    fn staggered_rows_give_excluded_crews_nothing() {
        let crews = vec![
            crew(1, "1", true),
            crew(2, "2", false),
            crew(3, "n/a", true),
        ];
        let active = active_ordering(&crews);
        let base = vec![ideal(10, "09:00:00"), ideal(11, "09:12:00")];

        let rows = staggered_rows(&active, &base, date(), 5);

        assert_eq!(rows.len(), 2);
        assert!(times_of(&rows, 2).is_empty());
        assert!(times_of(&rows, 3).is_empty());
    }

    #[test]
    fn no_eligible_crews_yields_no_reference_and_no_rows() {
        // all inactive or non-numeric: the ordering is empty, so the rebuild
        // has no reference crew and bails before the wipe, leaving whatever
        // rows already exist untouched
        let crews = vec![crew(1, "1", false), crew(2, "n/a", true)];

        let active = active_ordering(&crews);
        assert!(active.is_empty());
        assert!(active.first().is_none());

        let base = vec![ideal(10, "09:00:00")];
        assert!(staggered_rows(&active, &base, date(), 5).is_empty());
    }

    #[test]
    fn staggered_rows_are_idempotent_on_unchanged_input() {
        let crews = vec![crew(1, "1", true), crew(2, "2", true)];
        let active = active_ordering(&crews);
        let base = vec![ideal(10, "09:00:00"), ideal(11, "09:12:00")];

        let first = staggered_rows(&active, &base, date(), 5);
        let second = staggered_rows(&active, &base, date(), 5);
        assert_eq!(first, second);

        // the reference crew reproduces its own rows exactly, so a rerun
        // propagating from the regenerated rows changes nothing either
        assert_eq!(
            times_of(&first, 1),
            base.iter()
                .map(|b| (b.checkpoint_id, b.ideal_time))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn staggered_rows_wrap_past_midnight() {
        let crews = vec![crew(1, "1", true), crew(2, "2", true)];
        let active = active_ordering(&crews);
        let base = vec![ideal(10, "23:58:00")];

        let rows = staggered_rows(&active, &base, date(), 5);
        assert_eq!(
            times_of(&rows, 2),
            vec![(10, NaiveTime::from_hms_opt(0, 3, 0).unwrap())]
        );
    }

    #[test]
    fn parse_intervals_reads_adjacent_pairs_in_route_order() {
        let checkpoints = vec![checkpoint(10, 1), checkpoint(11, 2), checkpoint(12, 3)];
        let mut form = HashMap::new();
        form.insert("interval_10_11".to_string(), "02:30".to_string());
        form.insert("interval_11_12".to_string(), "10:00".to_string());

        let intervals = parse_intervals(&checkpoints, &form).unwrap();
        assert_eq!(
            intervals,
            vec![Duration::seconds(150), Duration::minutes(10)]
        );
    }

    #[test]
    fn parse_intervals_names_the_offending_pair() {
        let checkpoints = vec![checkpoint(10, 1), checkpoint(11, 2)];
        let form = HashMap::new();

        let error = parse_intervals(&checkpoints, &form).unwrap_err();
        assert_eq!(error.to_string(), "missing interval between CK 1 and CK 2");

        let mut form = HashMap::new();
        form.insert("interval_10_11".to_string(), "2.30".to_string());
        let error = parse_intervals(&checkpoints, &form).unwrap_err();
        assert!(error.to_string().contains("CK 1 and CK 2"));
        assert!(error.to_string().contains("expected MM:SS"));
    }

    #[test]
    fn numeric_ordering_takes_all_crews_even_inactive() {
        let crews = vec![crew(1, "2", false), crew(2, "1", true)];

        let ordered: Vec<i32> = numeric_ordering(&crews).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ordered, vec![2, 1]);
    }

    #[test]
    fn numeric_ordering_rejects_non_numeric_bibs() {
        let crews = vec![crew(1, "1", true), crew(2, "X", true)];

        let error = numeric_ordering(&crews).unwrap_err();
        assert!(error.to_string().contains("\"Crew X\""));
        assert!(error.to_string().contains("non-numeric bib"));
    }

    #[test]
    fn checkpoint_times_add_successively() {
        let start = date().and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        let times = checkpoint_times(start, &[Duration::seconds(150), Duration::minutes(10)]);

        let rendered: Vec<String> = times.iter().map(|t| t.time().to_string()).collect();
        assert_eq!(rendered, vec!["08:00:00", "08:02:30", "08:12:30"]);
    }

    #[test]
    fn manual_setup_scenario_flat_minute_per_position() {
        // start 08:00, one 02:30 interval between two checkpoints, crews 1 and 2
        let checkpoints = vec![checkpoint(10, 1), checkpoint(11, 2)];
        let crews = vec![crew(1, "1", true), crew(2, "2", true)];
        let ordered = numeric_ordering(&crews).unwrap();

        let start = date().and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        let times = checkpoint_times(start, &[Duration::seconds(150)]);
        let rows = flat_stagger_rows(&ordered, &checkpoints, &times);

        assert_eq!(
            times_of(&rows, 1),
            vec![
                (10, NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
                (11, NaiveTime::from_hms_opt(8, 2, 30).unwrap()),
            ]
        );
        assert_eq!(
            times_of(&rows, 2),
            vec![
                (10, NaiveTime::from_hms_opt(8, 1, 0).unwrap()),
                (11, NaiveTime::from_hms_opt(8, 3, 30).unwrap()),
            ]
        );
    }

    #[test]
    fn flat_stagger_ignores_the_configured_race_interval() {
        // the manual flow is always one minute per position, so the rows for
        // position 1 sit exactly 60 seconds after position 0 no matter what
        // the race says
        let checkpoints = vec![checkpoint(10, 1)];
        let crews = vec![crew(1, "1", true), crew(2, "2", true)];
        let ordered = numeric_ordering(&crews).unwrap();

        let start = date().and_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        let rows = flat_stagger_rows(&ordered, &checkpoints, &checkpoint_times(start, &[]));

        let delta = rows[1].ideal_time - rows[0].ideal_time;
        assert_eq!(delta, Duration::minutes(1));
    }
}
