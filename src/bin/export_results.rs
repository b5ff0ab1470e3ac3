use std::env;
use std::fs::File;

use rally_checkpoint_tracker::modules::models::general::establish_connection;
use rally_checkpoint_tracker::modules::scoring::{build_result_rows, write_results_csv};

/// dump the scored results of a race to a csv file
pub fn main() {
    let mut args = env::args().skip(1);
    let race_id: i32 = args
        .next()
        .expect("usage: export_results <race_id> [output.csv]")
        .parse()
        .expect("race id must be an integer");
    let output = args.next().unwrap_or_else(|| format!("results_race_{}.csv", race_id));

    let connection = &mut establish_connection();

    let (checkpoints, rows) =
        build_result_rows(connection, race_id).expect("Error scoring race");

    let file = File::create(&output).expect("Error creating output file");
    write_results_csv(file, &checkpoints, &rows).expect("Error writing csv");

    println!("wrote {} result rows to {}", rows.len(), output);
}
