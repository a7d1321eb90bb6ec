mod extension;
mod keyusage;

pub use extension::{Extension, Extensions, SubjectKeyIdentifier};
pub use keyusage::{ExtendedKeyUsage, KeyUsage};
