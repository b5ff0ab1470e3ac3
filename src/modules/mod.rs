pub mod crew_import;
pub mod qr_api;
pub mod scheduling;
pub mod scoring;

pub mod models {
    pub mod checkpoint;
    pub mod crew;
    pub mod ideal_time;
    pub mod race;
    pub mod scan;

    pub mod general;
}

pub mod helpers {
    pub mod parsing;
    pub mod time;

    pub mod logging;
}
