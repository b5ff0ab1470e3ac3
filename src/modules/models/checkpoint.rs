use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::error;
use serde::{Deserialize, Serialize};

use crate::macros::database_error_handeler::db_handle_get_error;
use crate::schema::checkpoints;

#[derive(Insertable, Serialize, Debug, Clone, Deserialize)]
#[diesel(table_name = checkpoints)]
pub struct NewCheckpoint {
    pub name: String,
    pub position: i32,
    pub race_id: i32,
}

#[derive(Queryable, Serialize, Identifiable, PartialEq, Eq, Hash, Debug, Clone, Deserialize)]
pub struct Checkpoint {
    pub id: i32,
    pub name: String,
    /// ordinal along the route, unique per race. sole ordering key for
    /// schedule propagation.
    pub position: i32,
    pub race_id: i32,
}

impl Checkpoint {
    /// # create the numbered checkpoints of a race
    /// inserts `count` checkpoints named "CK 1".."CK n" at positions 1..n
    ///
    /// ## Arguments
    /// * `conn` - the database connection
    /// * `race_id_in` - the owning race
    /// * `count` - how many checkpoints the route has
    ///
    /// ## Returns
    /// * `Vec<Checkpoint>` - the created checkpoints in route order
    pub fn create_numbered(
        conn: &mut PgConnection,
        race_id_in: i32,
        count: i32,
    ) -> QueryResult<Vec<Checkpoint>> {
        use crate::schema::checkpoints::dsl::*;

        let new_checkpoints: Vec<NewCheckpoint> = (1..=count)
            .map(|nth| NewCheckpoint {
                name: format!("CK {}", nth),
                position: nth,
                race_id: race_id_in,
            })
            .collect();

        let created: Vec<Checkpoint> = db_handle_get_error!(
            diesel::insert_into(checkpoints)
                .values(&new_checkpoints)
                .get_results(conn),
            "models/checkpoint:create_numbered",
            "checkpoints"
        );

        Ok(created)
    }

    pub fn get_by_id(conn: &mut PgConnection, checkpoint_id_in: i32) -> QueryResult<Checkpoint> {
        use crate::schema::checkpoints::dsl::*;

        checkpoints
            .filter(id.eq(checkpoint_id_in))
            .first::<Checkpoint>(conn)
    }

    /// # get the checkpoints of a race in route order
    /// ordinal ties are not expected; the secondary id ordering only keeps
    /// the result deterministic if they ever happen.
    pub fn for_race(conn: &mut PgConnection, race_id_in: i32) -> QueryResult<Vec<Checkpoint>> {
        use crate::schema::checkpoints::dsl::*;

        checkpoints
            .filter(race_id.eq(race_id_in))
            .order((position.asc(), id.asc()))
            .load::<Checkpoint>(conn)
    }

    pub fn rename(conn: &mut PgConnection, checkpoint_id_in: i32, name_in: &str) -> QueryResult<()> {
        use crate::schema::checkpoints::dsl::*;

        diesel::update(checkpoints.filter(id.eq(checkpoint_id_in)))
            .set(name.eq(name_in))
            .execute(conn)?;

        Ok(())
    }
}
