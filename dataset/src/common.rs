pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use indexmap::{IndexMap, IndexSet};
pub use itertools::{izip, Itertools as _};
pub use log::{info, warn};
pub use noisy_float::prelude::*;
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    fmt,
    fmt::Debug,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
