use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::error;
use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, FromForm};
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::macros::database_error_handeler::db_handle_get_error_http;
use crate::modules::models::checkpoint::Checkpoint;
use crate::modules::models::crew::Crew;
use crate::modules::models::general::establish_connection;
use crate::modules::models::ideal_time::IdealTime;
use crate::modules::models::race::Race;
use crate::modules::models::scan::ScanRecord;
use crate::modules::scheduling;

/**************************************************************************************************/
/**************** ROUTES **************************************************************************/
/**************************************************************************************************/

/***** RACE SETUP *****/

/// # create a race with its numbered checkpoints
#[post("/races/new", data = "<new_race>")]
pub fn create(new_race: Form<NewRaceFormData>) -> Result<Json<Race>, (Status, String)> {
    let form = new_race.into_inner();

    if form.interval < 0 {
        return Err((
            Status::BadRequest,
            "crew interval must not be negative".to_string(),
        ));
    }
    if form.checkpoint_count < 1 {
        return Err((
            Status::BadRequest,
            "a race needs at least one checkpoint".to_string(),
        ));
    }

    let start_time = match form.start_time.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                return Err((
                    Status::BadRequest,
                    format!("invalid start time \"{}\", expected YYYY-MM-DD HH:MM", raw),
                ))
            }
        },
    };

    let conn = &mut establish_connection();
    let race = match Race::new(conn, form.name.trim(), start_time, form.interval) {
        Ok(race) => race,
        Err(err) => {
            error!(target: "routes/race:create", "Error creating race. (error: {})", err);
            return Err((Status::InternalServerError, "could not create race".to_string()));
        }
    };

    if let Err(err) = Checkpoint::create_numbered(conn, race.id, form.checkpoint_count) {
        error!(target: "routes/race:create", "Error creating checkpoints. (error: {})", err);
        return Err((
            Status::InternalServerError,
            "could not create checkpoints".to_string(),
        ));
    }

    Ok(Json(race))
}

/// # all races, newest first
#[get("/races")]
pub fn list_all() -> Result<Json<Vec<Race>>, Status> {
    let conn = &mut establish_connection();

    let races = db_handle_get_error_http!(
        Race::get_all_chronologicaly(conn),
        "routes/race:list_all",
        "races"
    );

    Ok(Json(races))
}

/// # full race overview
/// crews in bib order plus the ideal and actual time grids keyed by crew
/// and checkpoint id
#[get("/races/<race_id>")]
pub fn detail(race_id: i32) -> Result<Json<RaceDetail>, Status> {
    let conn = &mut establish_connection();

    let race = match Race::get_by_id(conn, race_id) {
        Ok(race) => race,
        Err(diesel::result::Error::NotFound) => return Err(Status::NotFound),
        Err(err) => {
            error!(target: "routes/race:detail", "Error getting race. (error: {})", err);
            return Err(Status::InternalServerError);
        }
    };

    let checkpoints = db_handle_get_error_http!(
        Checkpoint::for_race(conn, race.id),
        "routes/race:detail",
        "checkpoints"
    );
    let crews = db_handle_get_error_http!(
        Crew::for_race(conn, race.id),
        "routes/race:detail",
        "crews"
    );

    let crews = sort_crews_for_display(crews);
    let crew_ids: Vec<i32> = crews.iter().map(|crew| crew.id).collect();

    let ideal_times = db_handle_get_error_http!(
        IdealTime::for_crews(conn, &crew_ids),
        "routes/race:detail",
        "ideal times"
    );
    let mut crew_times: HashMap<i32, HashMap<i32, String>> = HashMap::new();
    for row in ideal_times {
        crew_times
            .entry(row.crew_id)
            .or_default()
            .insert(row.checkpoint_id, row.ideal_time.format("%H:%M").to_string());
    }

    let scans = db_handle_get_error_http!(
        ScanRecord::for_crews(conn, &crew_ids),
        "routes/race:detail",
        "scan records"
    );
    let mut scan_times: HashMap<i32, HashMap<i32, String>> = HashMap::new();
    for scan in scans {
        // earliest first, so the first insert per pair wins
        scan_times
            .entry(scan.crew_id)
            .or_default()
            .entry(scan.checkpoint_id)
            .or_insert_with(|| scan.timestamp.format("%H:%M").to_string());
    }

    Ok(Json(RaceDetail {
        race,
        checkpoints,
        crews,
        crew_times,
        scan_times,
    }))
}

/// # checkpoint overview with the reference crew's schedule
#[get("/races/<race_id>/checkpoints")]
pub fn checkpoint_overview(race_id: i32) -> Result<Json<CheckpointOverview>, Status> {
    let conn = &mut establish_connection();

    let race = match Race::get_by_id(conn, race_id) {
        Ok(race) => race,
        Err(diesel::result::Error::NotFound) => return Err(Status::NotFound),
        Err(err) => {
            error!(target: "routes/race:checkpoint_overview", "Error getting race. (error: {})", err);
            return Err(Status::InternalServerError);
        }
    };

    let checkpoints = db_handle_get_error_http!(
        Checkpoint::for_race(conn, race.id),
        "routes/race:checkpoint_overview",
        "checkpoints"
    );
    let crews = db_handle_get_error_http!(
        Crew::for_race(conn, race.id),
        "routes/race:checkpoint_overview",
        "crews"
    );

    let mut reference_times: HashMap<i32, String> = HashMap::new();
    if let Some(reference) = scheduling::active_ordering(&crews).first() {
        let checkpoint_ids: Vec<i32> = checkpoints.iter().map(|ck| ck.id).collect();
        let rows = db_handle_get_error_http!(
            IdealTime::for_crew_in_checkpoints(conn, reference.id, &checkpoint_ids),
            "routes/race:checkpoint_overview",
            "ideal times"
        );
        for row in rows {
            reference_times.insert(row.checkpoint_id, row.ideal_time.format("%H:%M").to_string());
        }
    }

    Ok(Json(CheckpointOverview {
        race,
        checkpoints,
        reference_times,
    }))
}

/***** MANUAL SCHEDULE SETUP *****/

/// # seed the ideal-time schedule from operator input
/// the form carries `start_time`, `interval_<from>_<to>` pairs and optional
/// `name_<id>` checkpoint renames; see the scheduling module for the rules
#[post("/races/<race_id>/schedule", data = "<form>")]
pub fn setup_schedule(
    race_id: i32,
    form: Form<HashMap<String, String>>,
) -> Result<String, (Status, String)> {
    let conn = &mut establish_connection();

    match scheduling::setup_ideal_times(conn, race_id, &form.into_inner()) {
        Ok(()) => Ok("schedule saved".to_string()),
        Err(Error::ScheduleInputError { message }) => Err((Status::BadRequest, message)),
        Err(Error::DatabaseError {
            source: diesel::result::Error::NotFound,
        }) => Err((Status::NotFound, "race not found".to_string())),
        Err(err) => {
            error!(target: "routes/race:setup_schedule", "Error seeding schedule. (error: {})", err);
            Err((
                Status::InternalServerError,
                format!("schedule setup failed: {}", err),
            ))
        }
    }
}

/**************************************************************************************************/
/**************** HELPERS *************************************************************************/
/**************************************************************************************************/

/// bib-value ordering for display lists; non-numeric bibs sink to the end
fn sort_crews_for_display(mut crews: Vec<Crew>) -> Vec<Crew> {
    crews.sort_by_key(|crew| (crew.bib_value().unwrap_or(i64::MAX), crew.id));
    crews
}

#[derive(FromForm)]
pub struct NewRaceFormData {
    pub name: String,
    pub start_time: Option<String>,
    pub checkpoint_count: i32,
    pub interval: i32,
}

#[derive(Serialize, Deserialize)]
pub struct RaceDetail {
    pub race: Race,
    pub checkpoints: Vec<Checkpoint>,
    pub crews: Vec<Crew>,
    pub crew_times: HashMap<i32, HashMap<i32, String>>,
    pub scan_times: HashMap<i32, HashMap<i32, String>>,
}

#[derive(Serialize, Deserialize)]
pub struct CheckpointOverview {
    pub race: Race,
    pub checkpoints: Vec<Checkpoint>,
    pub reference_times: HashMap<i32, String>,
}
