//! # Parameter Store
//!
//! Every trainable tensor lives in one [`ParamStore`] under a hierarchical
//! name such as `encoder/layer_0/kernel`. Components ask a [`ParamScope`]
//! for their parameters; the scope's [`ParamMode`] decides whether a new
//! tensor is allocated or an existing one is bound. A training model built
//! with [`ParamMode::Create`] and an evaluation model built with
//! [`ParamMode::Reuse`] therefore read and update the same values.

use std::collections::BTreeMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::Mutex;

use candle_core::{Device, Tensor, Var};
use candle_nn::VarMap;
use oorandom::Rand32;

use crate::error::{Result, TaggerError};

/// Whether a component allocates its parameters or binds to existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    /// Allocate every parameter; fails if a name is already taken.
    Create,
    /// Bind to parameters created earlier; fails if a name is absent.
    Reuse,
}

/// Initial values for a newly created parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initializer {
    Zeros,
    /// Uniform in `±sqrt(6 / (fan_in + fan_out))` over the last two dimensions.
    GlorotUniform,
}

/// Owner of every trainable parameter, keyed by name.
pub struct ParamStore {
    varmap: VarMap,
    device: Device,
    rng: Mutex<Rand32>,
}

impl ParamStore {
    /// Create an empty store whose initialisers draw from `seed`.
    pub fn new(seed: u64, device: &Device) -> Self {
        Self {
            varmap: VarMap::new(),
            device: device.clone(),
            rng: Mutex::new(Rand32::new(seed)),
        }
    }

    /// Root scope for constructing a model against this store.
    pub fn root(&self, mode: ParamMode) -> ParamScope<'_> {
        ParamScope {
            store: self,
            prefix: String::new(),
            mode,
        }
    }

    /// All trainable parameters.
    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    /// Number of named parameters.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether no parameter has been created yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Sorted parameter names.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Look up a parameter by its full name.
    pub fn get(&self, name: &str) -> Result<Option<Tensor>> {
        Ok(self.lock()?.get(name).map(|var| var.as_tensor().clone()))
    }

    /// Copy out the current values of every parameter whose name starts with `prefix`.
    pub fn snapshot(&self, prefix: &str) -> Result<BTreeMap<String, Vec<f32>>> {
        let vars = self.lock()?;
        let mut values = BTreeMap::new();
        for (name, var) in vars.iter().filter(|(name, _)| name.starts_with(prefix)) {
            values.insert(name.clone(), var.flatten_all()?.to_vec1::<f32>()?);
        }
        Ok(values)
    }

    /// Total number of scalar weights.
    pub fn num_weights(&self) -> Result<usize> {
        Ok(self.lock()?.values().map(|var| var.elem_count()).sum())
    }

    /// Write every parameter to a safetensors file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Overwrite the values of existing parameters from a safetensors file.
    ///
    /// Handles held by models stay valid: values are replaced in place.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.varmap.load(path)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, std::collections::HashMap<String, Var>>> {
        self.varmap.data().lock().map_err(|_| TaggerError::StorePoisoned)
    }

    fn init_var(&self, shape: &[usize], init: Initializer) -> Result<Var> {
        let count: usize = shape.iter().product();
        let values = match init {
            Initializer::Zeros => vec![0f32; count],
            Initializer::GlorotUniform => {
                let (fan_in, fan_out) = match shape {
                    [] => (1, 1),
                    [n] => (*n, *n),
                    [.., a, b] => (*a, *b),
                };
                let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
                let mut rng = self.rng.lock().map_err(|_| TaggerError::StorePoisoned)?;
                (0..count)
                    .map(|_| (rng.rand_float() * 2.0 - 1.0) * limit)
                    .collect()
            }
        };
        let tensor = Tensor::from_vec(values, shape, &self.device)?;
        Ok(Var::from_tensor(&tensor)?)
    }
}

/// A named position in the store plus the create/reuse decision.
#[derive(Clone)]
pub struct ParamScope<'a> {
    store: &'a ParamStore,
    prefix: String,
    mode: ParamMode,
}

impl<'a> ParamScope<'a> {
    /// Descend into a child scope.
    pub fn pp(&self, name: &str) -> Self {
        Self {
            store: self.store,
            prefix: self.path(name),
            mode: self.mode,
        }
    }

    /// Allocate or bind the parameter `name` of the given shape.
    pub fn get(&self, shape: &[usize], name: &str, init: Initializer) -> Result<Tensor> {
        let path = self.path(name);
        match self.mode {
            ParamMode::Create => {
                let mut vars = self.store.lock()?;
                match vars.entry(path) {
                    Entry::Occupied(entry) => Err(TaggerError::ParamExists(entry.key().clone())),
                    Entry::Vacant(entry) => {
                        let var = self.store.init_var(shape, init)?;
                        let tensor = var.as_tensor().clone();
                        entry.insert(var);
                        Ok(tensor)
                    }
                }
            }
            ParamMode::Reuse => {
                let vars = self.store.lock()?;
                let var = vars
                    .get(&path)
                    .ok_or_else(|| TaggerError::ParamMissing(path.clone()))?;
                if var.dims() != shape {
                    return Err(TaggerError::ShapeMismatch {
                        what: path,
                        expected: shape.to_vec(),
                        actual: var.dims().to_vec(),
                    });
                }
                Ok(var.as_tensor().clone())
            }
        }
    }

    fn path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_reuse_binds_same_values() {
        let store = ParamStore::new(7, &Device::Cpu);
        let created = store
            .root(ParamMode::Create)
            .pp("layer")
            .get(&[3, 4], "w", Initializer::GlorotUniform)
            .unwrap();
        let bound = store
            .root(ParamMode::Reuse)
            .pp("layer")
            .get(&[3, 4], "w", Initializer::GlorotUniform)
            .unwrap();

        assert_eq!(created.id(), bound.id());
        assert_eq!(store.names().unwrap(), vec!["layer/w".to_string()]);
    }

    #[test]
    fn create_twice_fails() {
        let store = ParamStore::new(7, &Device::Cpu);
        let scope = store.root(ParamMode::Create);
        scope.get(&[2], "b", Initializer::Zeros).unwrap();
        let err = scope.get(&[2], "b", Initializer::Zeros).unwrap_err();
        assert!(matches!(err, TaggerError::ParamExists(name) if name == "b"));
    }

    #[test]
    fn concurrent_create_allocates_once() {
        let store = ParamStore::new(7, &Device::Cpu);
        let created: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        store
                            .root(ParamMode::Create)
                            .pp("shared")
                            .get(&[4, 4], "w", Initializer::GlorotUniform)
                            .is_ok()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(created.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn reuse_missing_fails() {
        let store = ParamStore::new(7, &Device::Cpu);
        let err = store
            .root(ParamMode::Reuse)
            .get(&[2], "b", Initializer::Zeros)
            .unwrap_err();
        assert!(matches!(err, TaggerError::ParamMissing(_)));
    }

    #[test]
    fn reuse_with_wrong_shape_fails() {
        let store = ParamStore::new(7, &Device::Cpu);
        store
            .root(ParamMode::Create)
            .get(&[2, 2], "w", Initializer::Zeros)
            .unwrap();
        let err = store
            .root(ParamMode::Reuse)
            .get(&[2, 3], "w", Initializer::Zeros)
            .unwrap_err();
        assert!(matches!(err, TaggerError::ShapeMismatch { .. }));
    }

    #[test]
    fn glorot_is_seeded_and_bounded() {
        let draw = |seed| {
            let store = ParamStore::new(seed, &Device::Cpu);
            store
                .root(ParamMode::Create)
                .get(&[10, 6], "w", Initializer::GlorotUniform)
                .unwrap()
                .flatten_all()
                .unwrap()
                .to_vec1::<f32>()
                .unwrap()
        };

        let a = draw(3);
        assert_eq!(a, draw(3));
        assert_ne!(a, draw(4));

        let limit = (6.0f32 / 16.0).sqrt();
        assert!(a.iter().all(|v| v.abs() <= limit));
    }

    #[test]
    fn snapshot_filters_by_prefix() {
        let store = ParamStore::new(1, &Device::Cpu);
        let root = store.root(ParamMode::Create);
        root.pp("encoder").get(&[2], "b", Initializer::Zeros).unwrap();
        root.pp("decoder").get(&[3], "b", Initializer::Zeros).unwrap();

        let snap = store.snapshot("encoder/").unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["encoder/b"], vec![0.0, 0.0]);
        assert_eq!(store.num_weights().unwrap(), 5);
    }
}
