use log::error;
use rocket::get;
use rocket::http::{ContentType, Status};

use crate::modules::models::general::establish_connection;
use crate::modules::models::race::Race;
use crate::modules::scoring;

/**************************************************************************************************/
/**************** ROUTES **************************************************************************/
/**************************************************************************************************/

/// # export the scored results of a race as csv
/// one row per crew with the per-checkpoint ideal/actual/points triples and
/// the total; rows are unranked
#[get("/races/<race_id>/export")]
pub fn results_csv(race_id: i32) -> Result<(ContentType, String), Status> {
    let conn = &mut establish_connection();

    // 404 before scoring an empty result set for a race that never existed
    match Race::get_by_id(conn, race_id) {
        Ok(_) => {}
        Err(diesel::result::Error::NotFound) => return Err(Status::NotFound),
        Err(err) => {
            error!(target: "routes/export:results_csv", "Error getting race. (error: {})", err);
            return Err(Status::InternalServerError);
        }
    }

    let (checkpoints, rows) = match scoring::build_result_rows(conn, race_id) {
        Ok(result) => result,
        Err(err) => {
            error!(target: "routes/export:results_csv", "Error scoring race. (error: {})", err);
            return Err(Status::InternalServerError);
        }
    };

    let mut buffer = Vec::new();
    if let Err(err) = scoring::write_results_csv(&mut buffer, &checkpoints, &rows) {
        error!(target: "routes/export:results_csv", "Error writing csv. (error: {})", err);
        return Err(Status::InternalServerError);
    }

    match String::from_utf8(buffer) {
        Ok(csv) => Ok((ContentType::CSV, csv)),
        Err(err) => {
            error!(target: "routes/export:results_csv", "Export was not valid utf-8. (error: {})", err);
            Err(Status::InternalServerError)
        }
    }
}
