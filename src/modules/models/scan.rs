use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::error;
use serde::{Deserialize, Serialize};

use crate::macros::database_error_handeler::db_handle_get_error;
use crate::schema::scan_records;

#[derive(Insertable, Serialize, Debug, Clone, Deserialize)]
#[diesel(table_name = scan_records)]
pub struct NewScanRecord {
    pub crew_id: i32,
    pub checkpoint_id: i32,
    pub timestamp: NaiveDateTime,
}

/// one observed passage of a crew through a checkpoint. append-only;
/// a crew may be scanned more than once, only the earliest scan counts
/// for scoring.
#[derive(Queryable, Serialize, Identifiable, PartialEq, Debug, Clone, Deserialize)]
pub struct ScanRecord {
    pub id: i32,
    pub crew_id: i32,
    pub checkpoint_id: i32,
    pub timestamp: NaiveDateTime,
}

impl ScanRecord {
    /// # record a passage
    ///
    /// ## Arguments
    /// * `conn` - the database connection
    /// * `crew_id_in` - the scanned crew
    /// * `checkpoint_id_in` - where the crew was scanned
    /// * `timestamp_in` - Prague wall clock time of the scan
    ///
    /// ## Returns
    /// * `ScanRecord` - the stored scan
    pub fn new(
        conn: &mut PgConnection,
        crew_id_in: i32,
        checkpoint_id_in: i32,
        timestamp_in: NaiveDateTime,
    ) -> QueryResult<ScanRecord> {
        use crate::schema::scan_records::dsl::*;

        let new_scan = NewScanRecord {
            crew_id: crew_id_in,
            checkpoint_id: checkpoint_id_in,
            timestamp: timestamp_in,
        };

        let scan: ScanRecord = db_handle_get_error!(
            diesel::insert_into(scan_records)
                .values(&new_scan)
                .get_result(conn),
            "models/scan:new",
            "scan record"
        );

        Ok(scan)
    }

    /// # get every scan of a set of crews, earliest first
    /// the ascending ordering is what makes first-wins map building in the
    /// scoring module pick the earliest scan per (crew, checkpoint)
    pub fn for_crews(conn: &mut PgConnection, crew_ids: &[i32]) -> QueryResult<Vec<ScanRecord>> {
        use crate::schema::scan_records::dsl::*;

        scan_records
            .filter(crew_id.eq_any(crew_ids))
            .order(timestamp.asc())
            .load::<ScanRecord>(conn)
    }

    /// # get every scan at a checkpoint, earliest first
    pub fn for_checkpoint(
        conn: &mut PgConnection,
        checkpoint_id_in: i32,
    ) -> QueryResult<Vec<ScanRecord>> {
        use crate::schema::scan_records::dsl::*;

        scan_records
            .filter(checkpoint_id.eq(checkpoint_id_in))
            .order(timestamp.asc())
            .load::<ScanRecord>(conn)
    }
}
