use log::error;
use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, FromForm};

use crate::errors::Error;
use crate::macros::database_error_handeler::db_handle_get_error_http;
use crate::modules::crew_import;
use crate::modules::models::crew::{Crew, NewCrew};
use crate::modules::models::general::establish_connection;
use crate::modules::qr_api;
use crate::modules::scheduling::recalculate_ideal_times;

/**************************************************************************************************/
/**************** ROUTES **************************************************************************/
/**************************************************************************************************/

/***** GETTERS *****/

/// # the crews of a race in bib order
#[get("/races/<race_id>/crews")]
pub fn list(race_id: i32) -> Result<Json<Vec<Crew>>, Status> {
    let conn = &mut establish_connection();

    let mut crews = db_handle_get_error_http!(
        Crew::for_race(conn, race_id),
        "routes/crew:list",
        "crews"
    );
    crews.sort_by_key(|crew| (crew.bib_value().unwrap_or(i64::MAX), crew.id));

    Ok(Json(crews))
}

/***** MODIFY CREWS *****/

/// # register a crew
/// the crew is committed first; QR generation and upload are best effort
/// and the schedule is rebuilt afterwards
#[post("/races/<race_id>/crews/new", data = "<new_crew>")]
pub fn create(
    race_id: i32,
    new_crew: Form<NewCrewFormData>,
) -> Result<Json<Crew>, (Status, String)> {
    let form = new_crew.into_inner();

    if form.name.trim().is_empty() || form.number.trim().is_empty() {
        return Err((
            Status::BadRequest,
            "crew name and bib number are required".to_string(),
        ));
    }

    let conn = &mut establish_connection();

    let crew = match Crew::new(
        conn,
        NewCrew {
            number: form.number.trim().to_string(),
            name: form.name.trim().to_string(),
            vehicle: form.vehicle.trim().to_string(),
            race_id,
            is_active: true,
            category: None,
            vehicle_year: None,
            penalty_year: None,
        },
    ) {
        Ok(crew) => crew,
        Err(err) => {
            error!(target: "routes/crew:create", "Error creating crew. (error: {})", err);
            return Err((Status::InternalServerError, "could not create crew".to_string()));
        }
    };

    qr_api::attach_qr_code(conn, &crew);

    if let Err(err) = recalculate_ideal_times(conn, race_id) {
        error!(target: "routes/crew:create", "Error recalculating schedule. (error: {})", err);
        return Err((
            Status::InternalServerError,
            "crew created but schedule recalculation failed".to_string(),
        ));
    }

    Ok(Json(crew))
}

/// # edit a crew
/// bib edits shift the stagger ordering, so the schedule is rebuilt
#[post("/crews/<crew_id>/edit", data = "<edit>")]
pub fn edit(crew_id: i32, edit: Form<EditCrewFormData>) -> Result<Json<Crew>, (Status, String)> {
    let form = edit.into_inner();

    if form.name.trim().is_empty() || form.number.trim().is_empty() {
        return Err((
            Status::BadRequest,
            "crew name and bib number are required".to_string(),
        ));
    }

    let conn = &mut establish_connection();

    let crew = match Crew::update(
        conn,
        crew_id,
        form.name.trim(),
        form.number.trim(),
        form.vehicle.trim(),
        form.is_active,
    ) {
        Ok(crew) => crew,
        Err(diesel::result::Error::NotFound) => {
            return Err((Status::NotFound, "crew not found".to_string()))
        }
        Err(err) => {
            error!(target: "routes/crew:edit", "Error updating crew. (error: {})", err);
            return Err((Status::InternalServerError, "could not update crew".to_string()));
        }
    };

    qr_api::attach_qr_code(conn, &crew);

    if let Err(err) = recalculate_ideal_times(conn, crew.race_id) {
        error!(target: "routes/crew:edit", "Error recalculating schedule. (error: {})", err);
        return Err((
            Status::InternalServerError,
            "crew updated but schedule recalculation failed".to_string(),
        ));
    }

    Ok(Json(crew))
}

/// # toggle a crew between active and inactive
#[post("/crews/<crew_id>/toggle_active")]
pub fn toggle_active(crew_id: i32) -> Result<Json<Crew>, Status> {
    let conn = &mut establish_connection();

    let crew = db_handle_get_error_http!(
        Crew::get_by_id(conn, crew_id),
        "routes/crew:toggle_active",
        "crew"
    );
    let crew = db_handle_get_error_http!(
        Crew::set_active(conn, crew.id, !crew.is_active),
        "routes/crew:toggle_active",
        "crew"
    );

    if let Err(err) = recalculate_ideal_times(conn, crew.race_id) {
        error!(target: "routes/crew:toggle_active", "Error recalculating schedule. (error: {})", err);
        return Err(Status::InternalServerError);
    }

    Ok(Json(crew))
}

/// # remove a crew and rebuild the schedule
#[post("/crews/<crew_id>/delete")]
pub fn delete(crew_id: i32) -> Result<Status, Status> {
    let conn = &mut establish_connection();

    let crew = db_handle_get_error_http!(
        Crew::get_by_id(conn, crew_id),
        "routes/crew:delete",
        "crew"
    );

    if let Err(err) = crew.delete(conn) {
        error!(target: "routes/crew:delete", "Error deleting crew. (error: {})", err);
        return Err(Status::InternalServerError);
    }

    if let Err(err) = recalculate_ideal_times(conn, crew.race_id) {
        error!(target: "routes/crew:delete", "Error recalculating schedule. (error: {})", err);
        return Err(Status::InternalServerError);
    }

    Ok(Status::Ok)
}

/***** IMPORT *****/

/// # import crews from a published start list
#[post("/races/<race_id>/crews/import", data = "<import>")]
pub fn import(
    race_id: i32,
    import: Form<ImportFormData>,
) -> Result<String, (Status, String)> {
    let form = import.into_inner();

    if form.source_url.trim().is_empty() {
        return Err((Status::BadRequest, "missing source_url".to_string()));
    }

    let conn = &mut establish_connection();

    match crew_import::import_crews(
        conn,
        race_id,
        form.source_url.trim(),
        form.start_row.unwrap_or(1),
    ) {
        Ok(count) => Ok(format!("imported {} crews", count)),
        Err(Error::RemoteFetchError { message }) => Err((Status::BadRequest, message)),
        Err(err) => {
            error!(target: "routes/crew:import", "Error importing crews. (error: {})", err);
            Err((Status::InternalServerError, "import failed".to_string()))
        }
    }
}

/**************************************************************************************************/
/**************** HELPERS *************************************************************************/
/**************************************************************************************************/

#[derive(FromForm)]
pub struct NewCrewFormData {
    pub name: String,
    pub number: String,
    pub vehicle: String,
}

#[derive(FromForm)]
pub struct EditCrewFormData {
    pub name: String,
    pub number: String,
    pub vehicle: String,
    pub is_active: bool,
}

#[derive(FromForm)]
pub struct ImportFormData {
    pub source_url: String,
    pub start_row: Option<usize>,
}
