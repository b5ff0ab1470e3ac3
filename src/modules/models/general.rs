use std::env;

use chrono::NaiveDateTime;
use chrono_tz::Europe::Prague;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use dotenvy::dotenv;

/// # establish a database connection
/// connect to the postgres database configured in `DATABASE_URL`
///
/// ## Returns
/// * `PgConnection` - the database connection
pub fn establish_connection() -> PgConnection {
    dotenv().ok();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgConnection::establish(&database_url)
        .unwrap_or_else(|_| panic!("Error connecting to {}", database_url))
}

/// current wall clock time in Prague.
/// scan timestamps and default schedule dates use race-local time,
/// never the server timezone.
pub fn prague_now() -> NaiveDateTime {
    chrono::Utc::now().with_timezone(&Prague).naive_local()
}
