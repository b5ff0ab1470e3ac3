pub mod errors;

pub mod schema;
pub mod modules;

pub mod macros {
    pub mod database_error_handeler;
}

pub mod routes {
    pub mod crew;
    pub mod export;
    pub mod race;
    pub mod scan;
}
