use chrono::NaiveTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::error;
use serde::{Deserialize, Serialize};

use crate::macros::database_error_handeler::db_handle_get_error;
use crate::schema::ideal_times;

#[derive(Insertable, Serialize, PartialEq, Debug, Clone, Deserialize)]
#[diesel(table_name = ideal_times)]
pub struct NewIdealTime {
    pub crew_id: i32,
    pub checkpoint_id: i32,
    pub ideal_time: NaiveTime,
}

/// derived cache row: one target arrival time per (crew, checkpoint).
/// exclusively rewritten by the scheduling module, never edited in place.
#[derive(Queryable, Serialize, Identifiable, PartialEq, Debug, Clone, Deserialize)]
pub struct IdealTime {
    pub id: i32,
    pub crew_id: i32,
    pub checkpoint_id: i32,
    pub ideal_time: NaiveTime,
}

impl IdealTime {
    /// # get the schedule of one crew
    /// rows restricted to the given checkpoints, ordered by checkpoint id
    ///
    /// ## Arguments
    /// * `conn` - the database connection
    /// * `crew_id_in` - the crew to load
    /// * `checkpoint_ids` - checkpoints of the owning race
    ///
    /// ## Returns
    /// * `Vec<IdealTime>` - the crew's schedule rows
    pub fn for_crew_in_checkpoints(
        conn: &mut PgConnection,
        crew_id_in: i32,
        checkpoint_ids: &[i32],
    ) -> QueryResult<Vec<IdealTime>> {
        use crate::schema::ideal_times::dsl::*;

        ideal_times
            .filter(crew_id.eq(crew_id_in))
            .filter(checkpoint_id.eq_any(checkpoint_ids))
            .order(checkpoint_id.asc())
            .load::<IdealTime>(conn)
    }

    /// # get every schedule row of a set of crews
    pub fn for_crews(conn: &mut PgConnection, crew_ids: &[i32]) -> QueryResult<Vec<IdealTime>> {
        use crate::schema::ideal_times::dsl::*;

        ideal_times
            .filter(crew_id.eq_any(crew_ids))
            .load::<IdealTime>(conn)
    }

    /// # get every schedule row of a single checkpoint
    pub fn for_checkpoint(
        conn: &mut PgConnection,
        checkpoint_id_in: i32,
    ) -> QueryResult<Vec<IdealTime>> {
        use crate::schema::ideal_times::dsl::*;

        ideal_times
            .filter(checkpoint_id.eq(checkpoint_id_in))
            .load::<IdealTime>(conn)
    }

    /// # wipe the schedule of a set of crews
    /// callers are expected to run this inside the same transaction as the
    /// re-insert, so no reader ever sees a half-built schedule
    pub fn delete_for_crews(conn: &mut PgConnection, crew_ids: &[i32]) -> QueryResult<usize> {
        use crate::schema::ideal_times::dsl::*;

        diesel::delete(ideal_times.filter(crew_id.eq_any(crew_ids))).execute(conn)
    }

    /// # wipe the schedule restricted to crews and checkpoints
    /// the manual setup flow deletes on both axes, matching what it inserts
    pub fn delete_for_crews_and_checkpoints(
        conn: &mut PgConnection,
        crew_ids: &[i32],
        checkpoint_ids: &[i32],
    ) -> QueryResult<usize> {
        use crate::schema::ideal_times::dsl::*;

        diesel::delete(
            ideal_times
                .filter(crew_id.eq_any(crew_ids))
                .filter(checkpoint_id.eq_any(checkpoint_ids)),
        )
        .execute(conn)
    }

    /// # insert a whole schedule in one statement
    pub fn insert_many(conn: &mut PgConnection, rows: &[NewIdealTime]) -> QueryResult<usize> {
        use crate::schema::ideal_times::dsl::*;

        let inserted = db_handle_get_error!(
            diesel::insert_into(ideal_times).values(rows).execute(conn),
            "models/ideal_time:insert_many",
            "ideal times"
        );

        Ok(inserted)
    }
}
