#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{}", _0)]
    Hierarchy(::outliner::errors::Error),
    #[fail(display = "{}", _0)]
    Bincode(::bincode::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<::outliner::errors::Error> for Error {
    fn from(err: ::outliner::errors::Error) -> Self {
        Error::Hierarchy(err)
    }
}

impl From<::bincode::Error> for Error {
    fn from(err: ::bincode::Error) -> Self {
        Error::Bincode(err)
    }
}
