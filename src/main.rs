use rocket::{launch, routes, Build, Rocket};

use rally_checkpoint_tracker::modules::helpers::logging::setup_logging;
use rally_checkpoint_tracker::routes::{crew, export, race, scan};

#[launch]
fn rocket() -> Rocket<Build> {
    setup_logging().expect("Failed to setup logging");

    rocket::build().mount(
        "/",
        routes![
            // races
            race::create,
            race::list_all,
            race::detail,
            race::checkpoint_overview,
            race::setup_schedule,
            // crews
            crew::list,
            crew::create,
            crew::edit,
            crew::toggle_active,
            crew::delete,
            crew::import,
            // scanning
            scan::record,
            scan::checkpoint_history,
            // results
            export::results_csv,
        ],
    )
}
