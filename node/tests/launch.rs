use std::{env, fs, net::TcpListener, path::PathBuf, process};

use base64::{Engine, engine::general_purpose::STANDARD};
use graph::HandleErr;
use node::{Config, LaunchErr, Plan};
use trainer::Role;

fn encode(server: &str) -> String {
    encode_with_clients(server, 2)
}

fn encode_with_clients(server: &str, client_count: usize) -> String {
    let json = format!(
        r#"{{"node_schema":["person:attrs"],"edge_schema":["person:knows:person"],"server":"{server}","client_count":{client_count}}}"#
    );
    STANDARD.encode(json)
}

#[test]
fn worked_example_index_one_is_the_second_worker() {
    let plan = Plan::new(Config::default(), &encode("h0,h1,h2,h3"), 1).unwrap();

    assert_eq!(plan.schema.node_type, "person");
    assert_eq!(plan.schema.edge_type, "knows");
    assert_eq!(plan.config.worker_hosts, ["h0", "h1"]);
    assert_eq!(plan.config.ps_hosts, ["h2", "h3"]);
    assert_eq!(plan.role, Role::Worker);
    assert_eq!(plan.task_index, 1);
    assert_eq!(plan.config.job_name, "worker");
    assert_eq!(plan.config.train_node_type, "person");
    assert_eq!(plan.config.client_count, 2);
    assert_eq!(plan.handle.server, "h2,h3");
    assert_eq!(plan.handle.client.as_deref(), Some("h0,h1"));
}

#[test]
fn index_three_is_the_second_parameter_server() {
    let plan = Plan::new(Config::default(), &encode("h0,h1,h2,h3"), 3).unwrap();

    assert_eq!(plan.role, Role::Ps);
    assert_eq!(plan.task_index, 1);
    assert_eq!(plan.config.job_name, "ps");
}

#[tokio::test]
async fn malformed_handle_fails_before_any_connection() {
    // Nothing listens on these hosts, reaching the network would hang on retries.
    let result = node::launch(Config::default(), "%%% not base64 %%%", 0).await;
    assert!(matches!(
        result,
        Err(LaunchErr::Handle(HandleErr::Base64(_)))
    ));

    let empty_schema = STANDARD.encode(r#"{"node_schema":[],"edge_schema":[],"server":"h0,h1","client_count":1}"#);
    let result = node::launch(Config::default(), &empty_schema, 0).await;
    assert!(matches!(
        result,
        Err(LaunchErr::Handle(HandleErr::Schema(_)))
    ));
}

fn free_addrs(n: usize) -> Vec<String> {
    let listeners: Vec<TcpListener> = (0..n)
        .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().to_string())
        .collect()
}

fn write_dataset(dir: &PathBuf) {
    fs::create_dir_all(dir).unwrap();
    let node_rows: String = (0..10)
        .map(|i| format!("{i}\t0.{i}:1.{i}:p{i}\n"))
        .collect();
    let edge_rows: String = (0..10)
        .map(|i| format!("{i}\t{}\t1.0\n", (i + 3) % 10))
        .collect();
    fs::write(
        dir.join(node::NODE_TABLE),
        format!("id:int64\tattributes:string\n{node_rows}"),
    )
    .unwrap();
    fs::write(
        dir.join(node::EDGE_TABLE),
        format!("src_id:int64\tdst_id:int64\tweight:float\n{edge_rows}"),
    )
    .unwrap();
}

fn small_config(dir: &PathBuf) -> Config {
    let mut config = Config::default();
    config.dataset_folder = dir.to_string_lossy().into_owned();
    config.emb_save_dir = dir.join("emb").to_string_lossy().into_owned();
    config.hidden_dim = 8;
    config.class_num = 4;
    config.neighs_num = vec![2, 2];
    config.batch_size = 4;
    config.neg_num = 2;
    config.in_drop_rate = 0.;
    config
}

fn saved_rows(prefix: &str) -> usize {
    let emb = fs::read(format!("{prefix}.npy")).unwrap();
    let ids = fs::read(format!("{prefix}_ids.npy")).unwrap();

    assert!(emb.starts_with(b"\x93NUMPY"));
    assert!(ids.starts_with(b"\x93NUMPY"));
    let header = String::from_utf8_lossy(&ids[10..]).into_owned();
    header
        .split("'shape': (")
        .nth(1)
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn four_processes_train_and_save_embeddings() {
    let dir = env::temp_dir().join(format!("node-launch-{}", process::id()));
    write_dataset(&dir);
    let config = small_config(&dir);

    let encoded = encode(&free_addrs(4).join(","));
    let tasks: Vec<_> = (0..4)
        .map(|index| {
            let (config, encoded) = (config.clone(), encoded.clone());
            tokio::spawn(async move { node::launch(config, &encoded, index).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let rows: usize = (0..2)
        .map(|task_index| saved_rows(&node::embedding_prefix(&config, task_index)))
        .sum();
    assert_eq!(rows, 10);

    fs::remove_dir_all(dir).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_client_embeds_every_node() {
    let dir = env::temp_dir().join(format!("node-launch-single-{}", process::id()));
    write_dataset(&dir);
    let config = small_config(&dir);

    // Two worker hosts but a single graph client, only the first worker runs.
    let encoded = encode_with_clients(&free_addrs(4).join(","), 1);
    let tasks: Vec<_> = [0, 2, 3]
        .into_iter()
        .map(|index| {
            let (config, encoded) = (config.clone(), encoded.clone());
            tokio::spawn(async move { node::launch(config, &encoded, index).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(saved_rows(&node::embedding_prefix(&config, 0)), 10);
    fs::remove_dir_all(dir).unwrap();
}
