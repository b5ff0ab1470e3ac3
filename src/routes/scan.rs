use std::collections::HashMap;

use log::error;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post};
use serde::{Deserialize, Serialize};

use crate::macros::database_error_handeler::db_handle_get_error_http;
use crate::modules::models::checkpoint::Checkpoint;
use crate::modules::models::crew::Crew;
use crate::modules::models::general::{establish_connection, prague_now};
use crate::modules::models::ideal_time::IdealTime;
use crate::modules::models::scan::ScanRecord;
use crate::modules::scheduling;

/**************************************************************************************************/
/**************** ROUTES **************************************************************************/
/**************************************************************************************************/

/// # record a crew passing a checkpoint
/// stamped with Prague wall clock time; repeated scans are stored as-is,
/// scoring later picks the earliest
#[post("/scan/<crew_id>/<checkpoint_id>")]
pub fn record(crew_id: i32, checkpoint_id: i32) -> Result<Json<ScanResponse>, Status> {
    let conn = &mut establish_connection();

    let crew = db_handle_get_error_http!(
        Crew::get_by_id(conn, crew_id),
        "routes/scan:record",
        "crew"
    );
    let checkpoint = db_handle_get_error_http!(
        Checkpoint::get_by_id(conn, checkpoint_id),
        "routes/scan:record",
        "checkpoint"
    );

    if crew.race_id != checkpoint.race_id {
        return Err(Status::BadRequest);
    }

    let scan = db_handle_get_error_http!(
        ScanRecord::new(conn, crew.id, checkpoint.id, prague_now()),
        "routes/scan:record",
        "scan record"
    );

    Ok(Json(ScanResponse {
        status: "ok".to_string(),
        message: format!(
            "recorded crew {} at {} ({})",
            crew.name, checkpoint.name, scan.timestamp
        ),
    }))
}

/// # checkpoint history
/// every crew of the race with its ideal time and earliest scan at this
/// checkpoint, plus passed/remaining counters and the first and last active
/// crew's ideal times
#[get("/checkpoints/<checkpoint_id>/history")]
pub fn checkpoint_history(checkpoint_id: i32) -> Result<Json<CheckpointHistory>, Status> {
    let conn = &mut establish_connection();

    let checkpoint = db_handle_get_error_http!(
        Checkpoint::get_by_id(conn, checkpoint_id),
        "routes/scan:checkpoint_history",
        "checkpoint"
    );

    let mut crews = db_handle_get_error_http!(
        Crew::for_race(conn, checkpoint.race_id),
        "routes/scan:checkpoint_history",
        "crews"
    );
    crews.sort_by_key(|crew| (crew.bib_value().unwrap_or(i64::MAX), crew.id));

    let ideal_rows = db_handle_get_error_http!(
        IdealTime::for_checkpoint(conn, checkpoint.id),
        "routes/scan:checkpoint_history",
        "ideal times"
    );
    let ideal_map: HashMap<i32, String> = ideal_rows
        .iter()
        .map(|row| (row.crew_id, row.ideal_time.format("%H:%M").to_string()))
        .collect();

    let scans = db_handle_get_error_http!(
        ScanRecord::for_checkpoint(conn, checkpoint.id),
        "routes/scan:checkpoint_history",
        "scan records"
    );
    let mut scan_map: HashMap<i32, String> = HashMap::new();
    for scan in &scans {
        // earliest first
        scan_map
            .entry(scan.crew_id)
            .or_insert_with(|| scan.timestamp.format("%H:%M").to_string());
    }

    let rows: Vec<CrewPassage> = crews
        .iter()
        .map(|crew| CrewPassage {
            crew_id: crew.id,
            number: crew.number.clone(),
            name: crew.name.clone(),
            is_active: crew.is_active,
            ideal_time: ideal_map.get(&crew.id).cloned(),
            scan_time: scan_map.get(&crew.id).cloned(),
        })
        .collect();

    let passed_count = scan_map.len();

    // ideal window of the active field at this checkpoint
    let active = scheduling::active_ordering(&crews);
    let first_crew_ideal = active.first().and_then(|crew| ideal_map.get(&crew.id).cloned());
    let last_crew_ideal = active.last().and_then(|crew| ideal_map.get(&crew.id).cloned());

    Ok(Json(CheckpointHistory {
        checkpoint,
        total_crews: rows.len(),
        passed_count,
        remaining: rows.len().saturating_sub(passed_count),
        first_crew_ideal,
        last_crew_ideal,
        crews: rows,
    }))
}

/**************************************************************************************************/
/**************** HELPERS *************************************************************************/
/**************************************************************************************************/

#[derive(Serialize, Deserialize)]
pub struct ScanResponse {
    pub status: String,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct CrewPassage {
    pub crew_id: i32,
    pub number: String,
    pub name: String,
    pub is_active: bool,
    pub ideal_time: Option<String>,
    pub scan_time: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CheckpointHistory {
    pub checkpoint: Checkpoint,
    pub total_crews: usize,
    pub passed_count: usize,
    pub remaining: usize,
    pub first_crew_ideal: Option<String>,
    pub last_crew_ideal: Option<String>,
    pub crews: Vec<CrewPassage>,
}
