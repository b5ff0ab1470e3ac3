use chrono::{NaiveDate, NaiveDateTime};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::error;
use serde::{Deserialize, Serialize};

use crate::macros::database_error_handeler::db_handle_get_error;
use crate::modules::models::general::prague_now;
use crate::schema::races;

#[derive(Insertable, Serialize, Debug, Clone, Deserialize)]
#[diesel(table_name = races)]
pub struct NewRace {
    pub name: String,
    pub start_time: Option<NaiveDateTime>,
    pub crew_interval: i32,
}

#[derive(Queryable, Serialize, Identifiable, PartialEq, Debug, Clone, Deserialize)]
pub struct Race {
    pub id: i32,
    pub name: String,
    pub start_time: Option<NaiveDateTime>,
    /// stagger between consecutive crews, in whole minutes. never negative.
    pub crew_interval: i32,
}

impl Race {
    /// # create race
    /// insert a new race. `crew_interval_in` must already be validated as >= 0.
    ///
    /// ## Arguments
    /// * `conn` - the database connection
    /// * `name_in` - display name of the race
    /// * `start_time_in` - scheduled start, if known
    /// * `crew_interval_in` - stagger between crews in minutes
    ///
    /// ## Returns
    /// * `Race` - the created race
    pub fn new(
        conn: &mut PgConnection,
        name_in: &str,
        start_time_in: Option<NaiveDateTime>,
        crew_interval_in: i32,
    ) -> QueryResult<Race> {
        use crate::schema::races::dsl::*;

        let new_race = NewRace {
            name: name_in.to_string(),
            start_time: start_time_in,
            crew_interval: crew_interval_in,
        };

        let race: Race = db_handle_get_error!(
            diesel::insert_into(races).values(&new_race).get_result(conn),
            "models/race:new",
            "race"
        );

        Ok(race)
    }

    pub fn get_by_id(conn: &mut PgConnection, race_id_in: i32) -> QueryResult<Race> {
        use crate::schema::races::dsl::*;

        races.filter(id.eq(race_id_in)).first::<Race>(conn)
    }

    /// # get all races sorted by start date
    /// newest race first, races without a start date last. postgres puts
    /// nulls first on a descending sort, so the nulls-last is explicit.
    pub fn get_all_chronologicaly(conn: &mut PgConnection) -> QueryResult<Vec<Race>> {
        use crate::schema::races::dsl::*;

        races
            .order(start_time.desc().nulls_last())
            .load::<Race>(conn)
    }

    /// the calendar date all ideal times of this race live on.
    /// falls back to today (Prague) when the race has no start time yet.
    pub fn base_date(&self) -> NaiveDate {
        match self.start_time {
            Some(start) => start.date(),
            None => prague_now().date(),
        }
    }
}
