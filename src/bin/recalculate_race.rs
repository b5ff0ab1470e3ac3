use std::env;

use rally_checkpoint_tracker::modules::models::general::establish_connection;
use rally_checkpoint_tracker::modules::scheduling::recalculate_ideal_times;

/// rebuild the ideal-time schedule of one race from the command line,
/// for when a schedule needs fixing without going through the web ui
pub fn main() {
    let race_id: i32 = env::args()
        .nth(1)
        .expect("usage: recalculate_race <race_id>")
        .parse()
        .expect("race id must be an integer");

    let connection = &mut establish_connection();

    match recalculate_ideal_times(connection, race_id) {
        Ok(()) => println!("recalculated ideal times of race {}", race_id),
        Err(error) => println!("recalculation failed: {}", error),
    }
}
