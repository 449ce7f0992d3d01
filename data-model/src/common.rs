pub use crate::error::{DataModelError, ResolutionError};
pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use getset::{CopyGetters, Getters};
pub use image::{DynamicImage, GenericImageView};
pub use indexmap::IndexMap;
pub use itertools::{izip, Itertools};
pub use log::{debug, info, warn};
pub use once_cell::sync::{Lazy, OnceCell};
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    collections::HashSet,
    fmt::{self, Debug, Display, Formatter},
    iter,
    path::{Path, PathBuf},
    str::FromStr,
    sync::RwLock,
};
pub use tch::{Device, Kind, Tensor};
pub use tch_goodies::TensorExt;
