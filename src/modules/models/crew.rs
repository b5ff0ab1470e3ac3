use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::error;
use serde::{Deserialize, Serialize};

use crate::macros::database_error_handeler::db_handle_get_error;
use crate::schema::crews;

#[derive(Insertable, Serialize, Debug, Clone, Deserialize)]
#[diesel(table_name = crews)]
pub struct NewCrew {
    pub number: String,
    pub name: String,
    pub vehicle: String,
    pub race_id: i32,
    pub is_active: bool,
    pub category: Option<String>,
    pub vehicle_year: Option<String>,
    pub penalty_year: Option<String>,
}

#[derive(Queryable, Serialize, Identifiable, PartialEq, Debug, Clone, Deserialize)]
pub struct Crew {
    pub id: i32,
    /// bib number, kept verbatim for display. "07" sorts as 7 but still
    /// renders as "07".
    pub number: String,
    pub name: String,
    pub vehicle: String,
    pub race_id: i32,
    pub is_active: bool,
    pub qr_code_url: Option<String>,
    pub category: Option<String>,
    pub vehicle_year: Option<String>,
    pub penalty_year: Option<String>,
}

impl Crew {
    /// # create crew
    ///
    /// ## Arguments
    /// * `conn` - the database connection
    /// * `new_crew` - the crew to insert
    ///
    /// ## Returns
    /// * `Crew` - the created crew
    pub fn new(conn: &mut PgConnection, new_crew: NewCrew) -> QueryResult<Crew> {
        use crate::schema::crews::dsl::*;

        let crew: Crew = db_handle_get_error!(
            diesel::insert_into(crews).values(&new_crew).get_result(conn),
            "models/crew:new",
            "crew"
        );

        Ok(crew)
    }

    pub fn get_by_id(conn: &mut PgConnection, crew_id_in: i32) -> QueryResult<Crew> {
        use crate::schema::crews::dsl::*;

        crews.filter(id.eq(crew_id_in)).first::<Crew>(conn)
    }

    /// # get all crews of a race
    /// loaded in insertion order; numeric bib ordering is done in memory
    /// because the bib column is a string (see scheduling::active_ordering)
    pub fn for_race(conn: &mut PgConnection, race_id_in: i32) -> QueryResult<Vec<Crew>> {
        use crate::schema::crews::dsl::*;

        crews
            .filter(race_id.eq(race_id_in))
            .order(id.asc())
            .load::<Crew>(conn)
    }

    /// # update the editable fields of a crew
    ///
    /// ## Returns
    /// * `Crew` - the crew after the update
    pub fn update(
        conn: &mut PgConnection,
        crew_id_in: i32,
        name_in: &str,
        number_in: &str,
        vehicle_in: &str,
        is_active_in: bool,
    ) -> QueryResult<Crew> {
        use crate::schema::crews::dsl::*;

        let crew: Crew = db_handle_get_error!(
            diesel::update(crews.filter(id.eq(crew_id_in)))
                .set((
                    name.eq(name_in),
                    number.eq(number_in),
                    vehicle.eq(vehicle_in),
                    is_active.eq(is_active_in),
                ))
                .get_result(conn),
            "models/crew:update",
            "crew"
        );

        Ok(crew)
    }

    pub fn set_active(conn: &mut PgConnection, crew_id_in: i32, active: bool) -> QueryResult<Crew> {
        use crate::schema::crews::dsl::*;

        diesel::update(crews.filter(id.eq(crew_id_in)))
            .set(is_active.eq(active))
            .get_result(conn)
    }

    pub fn set_qr_code_url(conn: &mut PgConnection, crew_id_in: i32, url: &str) -> QueryResult<()> {
        use crate::schema::crews::dsl::*;

        diesel::update(crews.filter(id.eq(crew_id_in)))
            .set(qr_code_url.eq(url))
            .execute(conn)?;

        Ok(())
    }

    /// # delete a crew and its dependent rows
    /// ideal times and scans reference the crew, so they go first, all in
    /// one transaction
    pub fn delete(&self, conn: &mut PgConnection) -> QueryResult<()> {
        use crate::schema::ideal_times;
        use crate::schema::scan_records;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(ideal_times::table.filter(ideal_times::crew_id.eq(self.id)))
                .execute(conn)?;
            diesel::delete(scan_records::table.filter(scan_records::crew_id.eq(self.id)))
                .execute(conn)?;
            diesel::delete(crews::table.filter(crews::id.eq(self.id))).execute(conn)?;

            Ok(())
        })
    }

    /// the bib as an integer, if the bib is a plain digit string.
    /// anything else ("", "A12", "1b", "+7") is non-numeric and excluded
    /// from stagger ordering.
    pub fn bib_value(&self) -> Option<i64> {
        let number = self.number.trim();
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        number.parse::<i64>().ok()
    }
}
