//! start-list import from a published HTML table.
//!
//! the registration office publishes the start list as a plain web page;
//! this module pulls the first table off it and turns the rows into crews.
//! cell columns 0, 1, 2, 5, 6 and 7 carry bib, name, vehicle, penalty-year
//! points, vehicle year and category.

use diesel::pg::PgConnection;
use log::{info, warn};
use regex::Regex;

use crate::errors::{CustomResult, Error};
use crate::modules::models::crew::{Crew, NewCrew};
use crate::modules::qr_api;
use crate::modules::scheduling::recalculate_ideal_times;

const COL_NUMBER: usize = 0;
const COL_NAME: usize = 1;
const COL_VEHICLE: usize = 2;
const COL_PENALTY_YEAR: usize = 5;
const COL_VEHICLE_YEAR: usize = 6;
const COL_CATEGORY: usize = 7;

/// least column index a usable row must reach
const MIN_COLUMNS: usize = COL_CATEGORY + 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedCrew {
    pub number: String,
    pub name: String,
    pub vehicle: String,
    pub penalty_year: String,
    pub vehicle_year: String,
    pub category: String,
}

/// # import the crews of a race from a remote start list
/// crews are committed first, then QR codes are generated and uploaded best
/// effort, then the schedule is recalculated once. an upload failure leaves
/// the crew without a QR url but never rolls the crew back.
///
/// ## Arguments
/// * `conn` - the database connection
/// * `race_id_in` - the race receiving the crews
/// * `source_url` - page carrying the start-list table
/// * `start_row` - header rows to skip before the first crew row
///
/// ## Returns
/// * `usize` - how many crews were imported
pub fn import_crews(
    conn: &mut PgConnection,
    race_id_in: i32,
    source_url: &str,
    start_row: usize,
) -> CustomResult<usize> {
    let rows = fetch_start_list(source_url)?;
    let imported = rows_to_crews(&rows, start_row);

    if imported.is_empty() {
        return Err(Error::RemoteFetchError {
            message: format!("no usable crew rows found at {}", source_url),
        });
    }

    let mut created = Vec::with_capacity(imported.len());
    for crew in &imported {
        created.push(Crew::new(
            conn,
            NewCrew {
                number: crew.number.clone(),
                name: crew.name.clone(),
                vehicle: crew.vehicle.clone(),
                race_id: race_id_in,
                is_active: true,
                category: Some(crew.category.clone()),
                vehicle_year: Some(crew.vehicle_year.clone()),
                penalty_year: Some(crew.penalty_year.clone()),
            },
        )?);
    }

    // crews are committed at this point; QR handling is best effort
    for crew in &created {
        qr_api::attach_qr_code(conn, crew);
    }

    recalculate_ideal_times(conn, race_id_in)?;

    info!(
        target: "crew_import",
        "imported {} crews into race {} from {}",
        created.len(),
        race_id_in,
        source_url
    );

    Ok(created.len())
}

/// # fetch a start list and extract its first table
pub fn fetch_start_list(source_url: &str) -> CustomResult<Vec<Vec<String>>> {
    let response = reqwest::blocking::get(source_url).map_err(|error| Error::RemoteFetchError {
        message: error.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(Error::RemoteFetchError {
            message: format!("{} returned {}", source_url, response.status()),
        });
    }

    let body = response.text().map_err(|error| Error::RemoteFetchError {
        message: error.to_string(),
    })?;

    let mut tables = extract_tables(&body);
    if tables.is_empty() {
        return Err(Error::RemoteFetchError {
            message: format!("no tables found at {}", source_url),
        });
    }

    Ok(tables.remove(0))
}

/// # extract every table on a page as rows of cell texts
/// tag soup in the wild is too messy for strictness; a row/cell scan with
/// tags stripped is enough for the start lists we consume
pub fn extract_tables(html: &str) -> Vec<Vec<Vec<String>>> {
    let table_re = Regex::new(r"(?is)<table[^>]*>.*?</table>").unwrap();
    let row_re = Regex::new(r"(?is)<tr[^>]*>.*?</tr>").unwrap();
    let cell_re = Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]>").unwrap();

    table_re
        .find_iter(html)
        .map(|table| {
            row_re
                .find_iter(table.as_str())
                .map(|row| {
                    cell_re
                        .captures_iter(row.as_str())
                        .map(|cell| clean_cell(&cell[1]))
                        .collect::<Vec<String>>()
                })
                .filter(|cells| !cells.is_empty())
                .collect::<Vec<Vec<String>>>()
        })
        .filter(|rows| !rows.is_empty())
        .collect()
}

/// # map raw table rows to crews
/// skips `start_row` leading rows, then takes the fixed import columns.
/// rows too short to carry all columns are skipped with a warning instead
/// of aborting the import.
pub fn rows_to_crews(rows: &[Vec<String>], start_row: usize) -> Vec<ImportedCrew> {
    rows.iter()
        .skip(start_row)
        .filter_map(|cells| {
            if cells.len() < MIN_COLUMNS {
                warn!(
                    target: "crew_import",
                    "skipping start-list row with {} cells (need {}): {:?}",
                    cells.len(),
                    MIN_COLUMNS,
                    cells
                );
                return None;
            }

            Some(ImportedCrew {
                number: cells[COL_NUMBER].clone(),
                name: cells[COL_NAME].clone(),
                vehicle: cells[COL_VEHICLE].clone(),
                penalty_year: cells[COL_PENALTY_YEAR].clone(),
                vehicle_year: cells[COL_VEHICLE_YEAR].clone(),
                category: cells[COL_CATEGORY].clone(),
            })
        })
        .collect()
}

fn clean_cell(raw: &str) -> String {
    let tag_re = Regex::new(r"(?s)<[^>]*>").unwrap();
    let text = tag_re.replace_all(raw, " ");

    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/**************************************************************************************************/
/**************** TESTS ***************************************************************************/
/**************************************************************************************************/

#[cfg(test)]
mod tests {
    use super::*;

    const START_LIST: &str = r#"
        <html><body>
        <h1>Start list</h1>
        <table class="startlist">
          <tr><th>No</th><th>Crew</th><th>Vehicle</th><th>x</th><th>y</th>
              <th>Penalty</th><th>Year</th><th>Class</th></tr>
          <tr><td>1</td><td>Novak&nbsp;&amp;&nbsp;Novakova</td><td><b>Aero 30</b></td>
              <td>-</td><td>-</td><td>0</td><td>1934</td><td>pre-war</td></tr>
          <tr><td>07</td><td>Svoboda</td><td>Tatra 57</td>
              <td>-</td><td>-</td><td>5</td><td>1931</td><td>pre-war</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn extract_tables_strips_tags_and_entities() {
        let tables = extract_tables(START_LIST);
        assert_eq!(tables.len(), 1);

        let rows = &tables[0];
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][1], "Novak & Novakova");
        assert_eq!(rows[1][2], "Aero 30");
    }

    #[test]
    fn rows_to_crews_reads_the_fixed_columns() {
        let rows = extract_tables(START_LIST).remove(0);
        let crews = rows_to_crews(&rows, 1);

        assert_eq!(crews.len(), 2);
        assert_eq!(
            crews[1],
            ImportedCrew {
                number: "07".to_string(),
                name: "Svoboda".to_string(),
                vehicle: "Tatra 57".to_string(),
                penalty_year: "5".to_string(),
                vehicle_year: "1931".to_string(),
                category: "pre-war".to_string(),
            }
        );
    }

    #[test]
    fn rows_to_crews_skips_short_rows() {
        let rows = vec![
            vec!["1".to_string(), "only two cells".to_string()],
            vec![
                "2".to_string(),
                "Full crew".to_string(),
                "Skoda 420".to_string(),
                "-".to_string(),
                "-".to_string(),
                "0".to_string(),
                "1936".to_string(),
                "pre-war".to_string(),
            ],
        ];

        let crews = rows_to_crews(&rows, 0);
        assert_eq!(crews.len(), 1);
        assert_eq!(crews[0].number, "2");
    }

    #[test]
    fn rows_to_crews_honours_start_row() {
        let rows = extract_tables(START_LIST).remove(0);
        // skipping two rows drops the header and the first crew
        let crews = rows_to_crews(&rows, 2);
        assert_eq!(crews.len(), 1);
        assert_eq!(crews[0].number, "07");
    }

    #[test]
    fn extract_tables_returns_nothing_for_tableless_pages() {
        assert!(extract_tables("<html><body><p>no data</p></body></html>").is_empty());
    }
}
