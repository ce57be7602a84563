/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub mod fmt;
pub mod percentiles;
pub mod timing;

pub use timing::AsSeconds;
