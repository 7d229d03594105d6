//! Time bookkeeping
//!
//! A structure's time can live in a `time` leaf at any level. Sequences of
//! time-slices each carry a scalar `time`, which stack into a vector; every
//! other sequence must agree on one time array for the tree to count as
//! homogeneous.

use tracing::info;

use crate::error::{OdsError, OdsResult};
use crate::path::{IntoAddress, Key, Path};
use crate::value::{NdArray, Value};

use super::{Node, Ods};

const TIME: &str = "time";
const SKIPPED: [&str; 2] = ["ids_properties", "code"];

#[derive(Debug, Clone, PartialEq)]
enum TimeInfo {
    Missing,
    Homogeneous(Value),
    Heterogeneous,
}

fn collect_time(node: &Node) -> TimeInfo {
    match node {
        Node::Unset | Node::Leaf(_) => TimeInfo::Missing,
        Node::Mapping(children) => {
            if let Some(Node::Leaf(time)) = children.get(TIME) {
                return TimeInfo::Homogeneous(time.clone());
            }
            let mut found = TimeInfo::Missing;
            for (name, child) in children {
                if SKIPPED.contains(&name.as_str()) {
                    continue;
                }
                match collect_time(child) {
                    TimeInfo::Missing => {}
                    TimeInfo::Heterogeneous => return TimeInfo::Heterogeneous,
                    time if found == TimeInfo::Missing => found = time,
                    time if time == found => {}
                    _ => return TimeInfo::Heterogeneous,
                }
            }
            found
        }
        Node::Sequence(items) => {
            let times: Vec<TimeInfo> = items.iter().map(collect_time).collect();
            if times.iter().all(|t| *t == TimeInfo::Missing) {
                return TimeInfo::Missing;
            }
            let mut values = Vec::with_capacity(times.len());
            for time in times {
                match time {
                    TimeInfo::Homogeneous(value) => values.push(value),
                    _ => return TimeInfo::Heterogeneous,
                }
            }

            if values.iter().all(|v| v.ndim() == 0) {
                let scalars: Option<Vec<f64>> = values.iter().map(Value::as_f64).collect();
                return match scalars {
                    Some(scalars) => TimeInfo::Homogeneous(Value::FloatArray(NdArray::from_vec(scalars))),
                    None => TimeInfo::Heterogeneous,
                };
            }
            let first = values[0].clone();
            if values.iter().all(|v| *v == first) {
                TimeInfo::Homogeneous(first)
            } else {
                TimeInfo::Heterogeneous
            }
        }
    }
}

impl Ods {
    fn time_info(&self, rel: &Path) -> OdsResult<TimeInfo> {
        let keys = self.resolve_for_read(rel)?;
        let node = self
            .root
            .descend(&keys)
            .ok_or_else(|| OdsError::MissingLeaf(rel.to_string()))?;
        Ok(collect_time(node))
    }

    /// Time vector of the subtree at `path`
    ///
    /// `None` when nothing below holds a time; an error when parts of the
    /// subtree disagree.
    pub fn time<A: IntoAddress>(&self, path: A) -> OdsResult<Option<Value>> {
        let rel = path.into_path()?;
        match self.time_info(&rel)? {
            TimeInfo::Missing => Ok(None),
            TimeInfo::Homogeneous(time) => Ok(Some(time)),
            TimeInfo::Heterogeneous => Err(OdsError::value_error(
                &rel,
                "time is not homogeneous below this node",
            )),
        }
    }

    /// True when every part of the subtree shares one time base
    pub fn homogeneous_time<A: IntoAddress>(&self, path: A) -> OdsResult<bool> {
        let rel = path.into_path()?;
        Ok(matches!(self.time_info(&rel)?, TimeInfo::Homogeneous(_)))
    }

    /// Set one element of a time vector, padding any gap with NaN
    pub fn set_time_array<A: IntoAddress>(&mut self, path: A, index: usize, time: f64) -> OdsResult<()> {
        let rel = path.into_path()?;
        let mut times = match self.get_raw(&rel) {
            Ok(value) if value.ndim() == 1 => value.to_f64_vec().ok_or_else(|| {
                OdsError::type_error(&rel, format!("{} is not a time vector", value.kind_name()))
            })?,
            Ok(value) => {
                return Err(OdsError::type_error(
                    &rel,
                    format!("{} is not a time vector", value.kind_name()),
                ));
            }
            Err(e) if e.is_missing() => Vec::new(),
            Err(e) => return Err(e),
        };
        if times.len() <= index {
            times.resize(index + 1, f64::NAN);
        }
        times[index] = time;
        self.set(&rel, times)
    }

    /// Fill the bookkeeping leaves every stored structure must carry
    ///
    /// Sets `ids_properties.homogeneous_time` to 1, 0 or 2 (homogeneous,
    /// heterogeneous, no time) and fills the structure level `time` vector
    /// when the time base is homogeneous. A structure holding time dependent
    /// data without any time is rejected.
    pub fn satisfy_requirements(&mut self) -> OdsResult<()> {
        let structures: Vec<Path> = match self.location.len() {
            0 => self
                .keys()
                .into_iter()
                .filter_map(|key| match key {
                    Key::Name(name) => Some(Path::root().child(name)),
                    Key::Index(_) => None,
                })
                .collect(),
            1 => vec![Path::root()],
            _ => {
                return Err(OdsError::Configuration(format!(
                    "`{}` is not a whole structure",
                    self.location
                )));
            }
        };

        for prefix in structures {
            let time_path = prefix.child(TIME);
            let homogeneous_time = match self.time_info(&prefix)? {
                TimeInfo::Homogeneous(time) => {
                    if self.get_raw(&time_path).is_err() {
                        let time = match time {
                            scalar if scalar.ndim() == 0 => Value::from(vec![scalar.as_f64().unwrap_or(f64::NAN)]),
                            vector => vector.into_float(),
                        };
                        self.set_raw(&time_path, time)?;
                    }
                    1
                }
                TimeInfo::Heterogeneous => 0,
                TimeInfo::Missing => {
                    if let Some(dynamic) = self.first_dynamic_leaf(&prefix) {
                        return Err(OdsError::value_error(
                            &dynamic,
                            "holds time dependent data but its structure has no time",
                        ));
                    }
                    2
                }
            };
            self.set_raw(
                prefix.child("ids_properties").child("homogeneous_time"),
                Value::Int(homogeneous_time),
            )?;
            info!(
                "`{}` homogeneous_time = {}",
                self.location.join(&prefix),
                homogeneous_time
            );
        }
        Ok(())
    }

    fn first_dynamic_leaf(&self, prefix: &Path) -> Option<Path> {
        self.paths().into_iter().find(|rel| {
            if !rel.starts_with(prefix) {
                return false;
            }
            let below = &rel.tokens()[prefix.len()..];
            if below
                .first()
                .and_then(|t| t.as_name())
                .is_some_and(|name| SKIPPED.contains(&name) || name == TIME)
            {
                return false;
            }
            self.schema
                .entry(&self.location.join(rel).ulocation())
                .is_some_and(|entry| entry.is_dynamic())
        })
    }
}
