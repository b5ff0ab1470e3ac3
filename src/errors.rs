use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("database error: {source}"))]
    #[snafu(context(false))]
    DatabaseError { source: diesel::result::Error },

    #[snafu(display("{message}"))]
    ScheduleInputError { message: String },

    #[snafu(display("upload failed: {message}"))]
    UploadError { message: String },

    #[snafu(display("qr generation failed: {message}"))]
    QrCodeError { message: String },

    #[snafu(display("failed loading remote table: {message}"))]
    RemoteFetchError { message: String },

    #[snafu(display("export failed: {message}"))]
    ExportError { message: String },
}

pub type CustomResult<T> = Result<T, Error>;

impl Error {
    pub fn schedule_input(message: impl Into<String>) -> Error {
        Error::ScheduleInputError {
            message: message.into(),
        }
    }
}
