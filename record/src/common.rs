pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
pub use indexmap::IndexMap;
pub use itertools::Itertools as _;
pub use std::{
    fmt,
    fmt::Debug,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    mem,
    path::{Path, PathBuf},
};
