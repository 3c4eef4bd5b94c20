use std::{
    env,
    error::Error,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use sage::{AggType, SageConfig, SageErr};
use serde::{Deserialize, Serialize};

/// The environment variable naming an optional JSON file that overrides the defaults.
pub const CONFIG_ENV: &str = "DIST_GRAPHSAGE_CONFIG";

/// Failures while loading the configuration overlay.
#[derive(Debug)]
pub enum ConfigErr {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErr::Read { path, source } => {
                write!(f, "couldn't read config {}: {source}", path.display())
            }
            ConfigErr::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigErr::Read { source, .. } => Some(source),
            ConfigErr::Parse { source, .. } => Some(source),
        }
    }
}

/// The launcher configuration.
///
/// The hyperparameters are read from the defaults and the optional overlay file, the cluster
/// fields below `emb_save_dir` are derived from the handle and the process index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset_folder: String,
    pub class_num: usize,
    pub features_num: usize,
    pub batch_size: usize,
    pub val_batch_size: usize,
    pub test_batch_size: usize,
    pub categorical_attrs_desc: String,
    pub hidden_dim: usize,
    pub in_drop_rate: f32,
    pub hops_num: usize,
    pub neighs_num: Vec<usize>,
    pub full_graph_mode: bool,
    pub agg_type: String,
    pub learning_algo: String,
    pub learning_rate: f32,
    pub weight_decay: f32,
    pub epoch: usize,
    pub unsupervised: bool,
    pub use_neg: bool,
    pub neg_num: usize,
    pub emb_save_dir: String,

    #[serde(skip)]
    pub node_type: String,
    #[serde(skip)]
    pub edge_type: String,
    #[serde(skip)]
    pub train_node_type: String,
    #[serde(skip)]
    pub client_count: usize,
    #[serde(skip)]
    pub worker_hosts: Vec<String>,
    #[serde(skip)]
    pub ps_hosts: Vec<String>,
    #[serde(skip)]
    pub job_name: String,
    #[serde(skip)]
    pub task_index: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_folder: "../../data/ldbc_10k_people/".to_string(),
            class_num: 32,
            features_num: 2,
            batch_size: 10,
            val_batch_size: 10,
            test_batch_size: 10,
            categorical_attrs_desc: String::new(),
            hidden_dim: 256,
            in_drop_rate: 0.5,
            hops_num: 2,
            neighs_num: vec![10, 20],
            full_graph_mode: false,
            agg_type: "gcn".to_string(),
            learning_algo: "adam".to_string(),
            learning_rate: 0.005,
            weight_decay: 0.0005,
            epoch: 1,
            unsupervised: true,
            use_neg: true,
            neg_num: 10,
            emb_save_dir: "./id_emb".to_string(),
            node_type: String::new(),
            edge_type: String::new(),
            train_node_type: String::new(),
            client_count: 0,
            worker_hosts: Vec::new(),
            ps_hosts: Vec::new(),
            job_name: String::new(),
            task_index: 0,
        }
    }
}

impl Config {
    /// Loads the defaults, overlaid with the file named by `DIST_GRAPHSAGE_CONFIG` if it is set.
    pub fn load() -> Result<Self, ConfigErr> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reads a JSON overlay, keys it doesn't name keep their default value.
    ///
    /// # Arguments
    /// * `path` - The JSON file.
    ///
    /// # Returns
    /// The merged configuration or the `ConfigErr` of the read or parse failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigErr> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigErr::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigErr::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The model hyperparameters.
    ///
    /// Without negative sampling the loss only has its positive term.
    pub fn sage_config(&self) -> Result<SageConfig, SageErr> {
        Ok(SageConfig {
            features_num: self.features_num,
            hidden_dim: self.hidden_dim,
            class_num: self.class_num,
            neighs_num: self.neighs_num.clone(),
            agg_type: self.agg_type.parse::<AggType>()?,
            in_drop_rate: self.in_drop_rate,
            neg_num: if self.use_neg { self.neg_num } else { 0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::process;

    use super::*;

    fn temp_file(tag: &str, contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("node-config-{}-{tag}.json", process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_match_the_driver_constants() {
        let config = Config::default();

        assert_eq!(config.dataset_folder, "../../data/ldbc_10k_people/");
        assert_eq!(config.neighs_num, vec![10, 20]);
        assert_eq!(config.hops_num, config.neighs_num.len());
        assert_eq!(config.learning_algo, "adam");
        assert_eq!(config.emb_save_dir, "./id_emb");
        assert!(config.unsupervised && config.use_neg);
        assert!(config.worker_hosts.is_empty() && config.ps_hosts.is_empty());
    }

    #[test]
    fn overlay_keeps_unnamed_keys() {
        let path = temp_file("overlay", r#"{"epoch": 3, "agg_type": "mean", "node_type": "x"}"#);
        let config = Config::from_file(&path).unwrap();
        fs::remove_file(path).unwrap();

        assert_eq!(config.epoch, 3);
        assert_eq!(config.agg_type, "mean");
        assert_eq!(config.node_type, "");
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn broken_overlays_are_errors() {
        let path = temp_file("broken", "{ epoch: ");
        let parsed = Config::from_file(&path);
        fs::remove_file(path).unwrap();

        assert!(matches!(parsed, Err(ConfigErr::Parse { .. })));
        assert!(matches!(
            Config::from_file("/nonexistent/dist-graphsage.json"),
            Err(ConfigErr::Read { .. })
        ));
    }

    #[test]
    fn sage_config_follows_the_hyperparameters() {
        let mut config = Config::default();
        let sage = config.sage_config().unwrap();
        assert_eq!(sage.dims(), vec![2, 256, 32]);
        assert_eq!(sage.neg_num, 10);

        config.use_neg = false;
        assert_eq!(config.sage_config().unwrap().neg_num, 0);

        config.agg_type = "max".to_string();
        assert!(config.sage_config().is_err());
    }
}
