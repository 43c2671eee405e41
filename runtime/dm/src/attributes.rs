//! Notification attributes
//!
//! # Purpose
//! Attributes steer how Observe notifications are produced. They are stored
//! by Objects (per SSID) and modified through Write-Attributes.
//!
//! # Attribute Sets
//! - [`OiAttributes`]: attributes valid at every level (`pmin`, `pmax`,
//!   `epmin`, `epmax`)
//! - [`ResourceAttributes`]: the above plus the value-based ones (`gt`,
//!   `lt`, `st`), valid only on Resources and Resource Instances
//!
//! # Write-Attributes
//! A request carries a [`RequestAttributes`]: every attribute is either
//! left alone, set to a value or unset (`?pmin` with no value). Merging it
//! into the stored set must produce a consistent result, see
//! [`OiAttributes::validate`] and [`ResourceAttributes::validate`].

use core::fmt::{self, Write as _};

use crate::error::{DmError, Result};

/// Object- and Instance-level attributes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OiAttributes {
    pub min_period: Option<i32>,
    pub max_period: Option<i32>,
    pub min_eval_period: Option<i32>,
    pub max_eval_period: Option<i32>,
}

impl OiAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check the periods are consistent
    ///
    /// # Errors
    /// `BadRequest` if `pmin > pmax` or `epmin > epmax`
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_period, self.max_period) {
            if min > max {
                return Err(DmError::BadRequest);
            }
        }
        if let (Some(min), Some(max)) = (self.min_eval_period, self.max_eval_period) {
            if min > max {
                return Err(DmError::BadRequest);
            }
        }
        Ok(())
    }
}

/// Resource- and Resource-Instance-level attributes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResourceAttributes {
    pub common: OiAttributes,
    pub greater_than: Option<f64>,
    pub less_than: Option<f64>,
    pub step: Option<f64>,
}

impl ResourceAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check the periods and thresholds are consistent
    ///
    /// # Errors
    /// `BadRequest` if the periods are inconsistent, `st` is negative,
    /// `lt >= gt`, or `lt + 2*st >= gt`
    pub fn validate(&self) -> Result<()> {
        self.common.validate()?;
        if self.step.is_some_and(|st| st < 0.0) {
            return Err(DmError::BadRequest);
        }
        if let (Some(lt), Some(gt)) = (self.less_than, self.greater_than) {
            if lt >= gt {
                return Err(DmError::BadRequest);
            }
            if let Some(st) = self.step {
                if lt + 2.0 * st >= gt {
                    return Err(DmError::BadRequest);
                }
            }
        }
        Ok(())
    }
}

/// Modification of one attribute requested by Write-Attributes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AttrChange<T> {
    #[default]
    Unchanged,
    Set(T),
    Unset,
}

impl<T: Copy> AttrChange<T> {
    fn apply(self, slot: &mut Option<T>) {
        match self {
            AttrChange::Unchanged => {}
            AttrChange::Set(value) => *slot = Some(value),
            AttrChange::Unset => *slot = None,
        }
    }

    fn is_unchanged(&self) -> bool {
        matches!(self, AttrChange::Unchanged)
    }
}

/// Attributes carried by a Write-Attributes request
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RequestAttributes {
    pub min_period: AttrChange<i32>,
    pub max_period: AttrChange<i32>,
    pub min_eval_period: AttrChange<i32>,
    pub max_eval_period: AttrChange<i32>,
    pub greater_than: AttrChange<f64>,
    pub less_than: AttrChange<f64>,
    pub step: AttrChange<f64>,
}

impl RequestAttributes {
    /// Parse URI query options (`pmin=10`, `gt=3.5`, `pmax` to unset)
    ///
    /// # Errors
    /// `BadRequest` on unknown attributes, duplicates, or unparseable or
    /// negative period values
    pub fn from_query<'q, I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'q str>,
    {
        fn period(value: Option<&str>) -> Result<AttrChange<i32>> {
            match value {
                None => Ok(AttrChange::Unset),
                Some(v) => match v.parse::<i32>() {
                    Ok(p) if p >= 0 => Ok(AttrChange::Set(p)),
                    _ => Err(DmError::BadRequest),
                },
            }
        }

        fn threshold(value: Option<&str>) -> Result<AttrChange<f64>> {
            match value {
                None => Ok(AttrChange::Unset),
                Some(v) => match v.parse::<f64>() {
                    Ok(t) if t.is_finite() => Ok(AttrChange::Set(t)),
                    _ => Err(DmError::BadRequest),
                },
            }
        }

        fn store<T>(slot: &mut AttrChange<T>, change: AttrChange<T>) -> Result<()>
        where
            T: Copy,
        {
            if !slot.is_unchanged() {
                return Err(DmError::BadRequest);
            }
            *slot = change;
            Ok(())
        }

        let mut attrs = Self::default();
        for option in options {
            let (key, value) = match option.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (option, None),
            };
            match key {
                "pmin" => store(&mut attrs.min_period, period(value)?)?,
                "pmax" => store(&mut attrs.max_period, period(value)?)?,
                "epmin" => store(&mut attrs.min_eval_period, period(value)?)?,
                "epmax" => store(&mut attrs.max_eval_period, period(value)?)?,
                "gt" => store(&mut attrs.greater_than, threshold(value)?)?,
                "lt" => store(&mut attrs.less_than, threshold(value)?)?,
                "st" => store(&mut attrs.step, threshold(value)?)?,
                _ => return Err(DmError::BadRequest),
            }
        }
        Ok(attrs)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True if `gt`, `lt` or `st` is touched
    pub fn has_resource_specific(&self) -> bool {
        !(self.greater_than.is_unchanged()
            && self.less_than.is_unchanged()
            && self.step.is_unchanged())
    }

    pub fn apply_common(&self, attrs: &mut OiAttributes) {
        self.min_period.apply(&mut attrs.min_period);
        self.max_period.apply(&mut attrs.max_period);
        self.min_eval_period.apply(&mut attrs.min_eval_period);
        self.max_eval_period.apply(&mut attrs.max_eval_period);
    }

    pub fn apply_resource(&self, attrs: &mut ResourceAttributes) {
        self.apply_common(&mut attrs.common);
        self.greater_than.apply(&mut attrs.greater_than);
        self.less_than.apply(&mut attrs.less_than);
        self.step.apply(&mut attrs.step);
    }
}

/// Formats attributes as Link Format parameters (`;pmin=10;gt=3.5`)
pub struct LinkAttrs<'a, A>(pub &'a A);

fn write_int(out: &mut String, name: &str, value: Option<i32>) -> fmt::Result {
    match value {
        Some(v) => write!(out, ";{}={}", name, v),
        None => Ok(()),
    }
}

fn write_float(out: &mut String, name: &str, value: Option<f64>) -> fmt::Result {
    match value {
        Some(v) => write!(out, ";{}={}", name, v),
        None => Ok(()),
    }
}

fn format_common(attrs: &OiAttributes) -> core::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write_int(&mut out, "pmin", attrs.min_period)?;
    write_int(&mut out, "pmax", attrs.max_period)?;
    write_int(&mut out, "epmin", attrs.min_eval_period)?;
    write_int(&mut out, "epmax", attrs.max_eval_period)?;
    Ok(out)
}

impl fmt::Display for LinkAttrs<'_, OiAttributes> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_common(self.0)?)
    }
}

impl fmt::Display for LinkAttrs<'_, ResourceAttributes> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = format_common(&self.0.common)?;
        write_float(&mut out, "gt", self.0.greater_than)?;
        write_float(&mut out, "lt", self.0.less_than)?;
        write_float(&mut out, "st", self.0.step)?;
        f.write_str(&out)
    }
}
