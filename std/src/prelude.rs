pub use crate::actors::sink::{Console, DumpFile, Null};
pub use crate::actors::source::{FileSupplier, ForLoop, GetStorageValue, Start, StringConstants};
pub use crate::actors::transformer::{
    DeepCopy, DeleteStorageValue, InitStorageValue, MathExpression, PassThrough, SetStorageValue,
    UpdateStorageValue,
};
