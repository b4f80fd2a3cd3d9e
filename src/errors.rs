use crate::Entity;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{} is not alive in this hierarchy.", _0)]
    NotFound(Entity),
    #[fail(display = "{} has not been added to the flat sequence.", _0)]
    Detached(Entity),
    #[fail(display = "{} can not become a child of its own heir {}.", child, parent)]
    CyclicParent { child: Entity, parent: Entity },
    #[fail(display = "Scale {:?} has a component below the minimum {}.", scale, min)]
    DegenerateScale { scale: [f32; 3], min: f32 },
    #[fail(display = "Rotation {:?} can not be normalized.", rotation)]
    DegenerateRotation { rotation: [f32; 4] },
    #[fail(display = "Transform of {} can not be inverted.", _0)]
    SingularTransform(Entity),
    #[fail(display = "Neighbour range [{}, {}] is reversed.", left, right)]
    InvalidRange { left: usize, right: usize },
    #[fail(display = "Hierarchy is corrupted: {}", _0)]
    Corrupted(String),
    #[fail(display = "Malformed world file: {}", _0)]
    Malformed(String),
    #[fail(display = "{}", _0)]
    Json(::serde_json::Error),
    #[fail(display = "{}", _0)]
    IO(::std::io::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<::std::io::Error> for Error {
    fn from(err: ::std::io::Error) -> Self {
        Error::IO(err)
    }
}

impl From<::serde_json::Error> for Error {
    fn from(err: ::serde_json::Error) -> Self {
        Error::Json(err)
    }
}
