use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataLoaderError>;

#[derive(Debug, Error)]
pub enum DataLoaderError {
    #[error("data adapter dependency cycle involving {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
}
