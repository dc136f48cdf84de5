use std::path::Path;

use crate::config::{ForkingTaskRunnerConfig, Properties};
use crate::task::Task;
use crate::tokenizer::tokenize;

/// `druid.indexer.runner.javaOpts` in a task's context carries per-task JVM options.
const RUNNER_JAVA_OPTS_KEY: &str = "druid.indexer.runner.javaOpts";
/// Process-wide properties under this prefix are forwarded to every child with the prefix
/// stripped.
const FORK_PROPERTY_PREFIX: &str = "druid.indexer.fork.property.";
/// Classpath entries are joined the way the JVM expects on a Unix host.
const CLASSPATH_SEPARATOR: char = ':';

#[allow(clippy::too_many_arguments)]
pub fn build_argv(
    config: &ForkingTaskRunnerConfig,
    task: &Task,
    properties: &Properties,
    node_host: &str,
    primary_port: u16,
    chat_port: Option<u16>,
    task_dir: &Path,
    attempt_dir: &Path,
) -> Vec<String> {
    let mut argv = Vec::new();

    // 1. java command
    argv.push(config.java_command.clone());

    // 2. classpath
    argv.push("-cp".to_string());
    match task.classpath_prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => {
            argv.push(format!(
                "{prefix}{CLASSPATH_SEPARATOR}{}",
                config.classpath
            ));
        }
        _ => argv.push(config.classpath.clone()),
    }

    // 3. javaOpts from config
    argv.extend(tokenize(&config.java_opts));

    // 4. per-task javaOpts
    if let Some(value) = task.context.get(RUNNER_JAVA_OPTS_KEY).and_then(|v| v.as_str()) {
        argv.extend(tokenize(value));
    }

    // 5. allowed process-wide properties
    let mut allowed: Vec<(&String, &String)> = properties
        .iter()
        .filter(|(name, _)| {
            *name != RUNNER_JAVA_OPTS_KEY
                && config
                    .allowed_prefixes
                    .iter()
                    .any(|prefix| name.starts_with(prefix.as_str()))
        })
        .collect();
    allowed.sort_by_key(|(name, _)| name.as_str());
    for (name, value) in allowed {
        argv.push(format!("-D{name}={value}"));
    }

    // 6. process-wide fork properties, prefix stripped
    let mut fork_properties: Vec<(&str, &String)> = properties
        .iter()
        .filter_map(|(name, value)| name.strip_prefix(FORK_PROPERTY_PREFIX).map(|n| (n, value)))
        .collect();
    fork_properties.sort_by_key(|(name, _)| *name);
    for (name, value) in fork_properties {
        argv.push(format!("-D{name}={value}"));
    }

    // 7. task-context fork properties, prefix stripped
    let mut task_fork_properties: Vec<(&str, &str)> = task
        .context
        .iter()
        .filter_map(|(name, value)| {
            let stripped = name.strip_prefix(FORK_PROPERTY_PREFIX)?;
            let value = value.as_str()?;
            Some((stripped, value))
        })
        .collect();
    task_fork_properties.sort_by_key(|(name, _)| *name);
    for (name, value) in task_fork_properties {
        argv.push(format!("-D{name}={value}"));
    }

    // 8. metric-dimension properties
    argv.push(format!(
        "-D{}dataSource={}",
        config.metric_dimension_prefix, task.data_source
    ));
    argv.push(format!(
        "-D{}taskId={}",
        config.metric_dimension_prefix, task.id
    ));

    // 9. host/port
    argv.push(format!("-Ddruid.host={node_host}"));
    argv.push(format!("-Ddruid.port={primary_port}"));

    // 10. chat-handler endpoint
    if config.separate_ingestion_endpoint {
        let chat_port =
            chat_port.expect("chat port must have been reserved when separateIngestionEndpoint is enabled");
        argv.push("-Ddruid.indexer.task.chathandler.service=placeholder/serviceName".to_string());
        argv.push(format!("-Ddruid.indexer.task.chathandler.host={node_host}"));
        argv.push(format!("-Ddruid.indexer.task.chathandler.port={chat_port}"));
    }

    // 11. entry point and verbs
    argv.push("io.druid.cli.Main".to_string());
    argv.push("internal".to_string());
    argv.push("peon".to_string());

    // 12. positional task/status paths
    argv.push(task_dir.join("task.json").to_string_lossy().into_owned());
    argv.push(
        attempt_dir
            .join("status.json")
            .to_string_lossy()
            .into_owned(),
    );

    // 13. node type
    if let Some(node_type) = &task.node_type {
        argv.push("--nodeType".to_string());
        argv.push(node_type.clone());
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn base_config() -> ForkingTaskRunnerConfig {
        ForkingTaskRunnerConfig {
            java_command: "java".to_string(),
            java_opts: "-Xmx512m".to_string(),
            classpath: "/opt/druid/lib/*".to_string(),
            start_port: 8100,
            allowed_prefixes: vec!["druid.".to_string()],
            separate_ingestion_endpoint: false,
            metric_dimension_prefix: "druid.indexer.task.".to_string(),
        }
    }

    fn base_task() -> Task {
        Task {
            id: "T1".to_string(),
            data_source: "wikipedia".to_string(),
            classpath_prefix: None,
            node_type: None,
            context: HashMap::new(),
            can_restore: true,
        }
    }

    #[test]
    fn builds_the_fixed_template_in_order() {
        let config = base_config();
        let task = base_task();
        let argv = build_argv(
            &config,
            &task,
            &Properties::new(),
            "localhost",
            8101,
            None,
            &PathBuf::from("/var/tasks/T1"),
            &PathBuf::from("/var/tasks/T1/attempt-1"),
        );

        assert_eq!(argv[0], "java");
        assert_eq!(argv[1], "-cp");
        assert_eq!(argv[2], "/opt/druid/lib/*");
        assert!(argv.contains(&"-Xmx512m".to_string()));
        assert!(argv.contains(&"-Ddruid.indexer.task.dataSource=wikipedia".to_string()));
        assert!(argv.contains(&"-Ddruid.indexer.task.taskId=T1".to_string()));
        assert!(argv.contains(&"-Ddruid.host=localhost".to_string()));
        assert!(argv.contains(&"-Ddruid.port=8101".to_string()));
        let main_pos = argv.iter().position(|a| a == "io.druid.cli.Main").unwrap();
        assert_eq!(argv[main_pos + 1], "internal");
        assert_eq!(argv[main_pos + 2], "peon");
        assert_eq!(argv[main_pos + 3], "/var/tasks/T1/task.json");
        assert_eq!(
            argv[main_pos + 4],
            "/var/tasks/T1/attempt-1/status.json"
        );
    }

    #[test]
    fn classpath_prefix_is_prepended_when_present() {
        let config = base_config();
        let mut task = base_task();
        task.classpath_prefix = Some("/extra/lib/*".to_string());
        let argv = build_argv(
            &config,
            &task,
            &Properties::new(),
            "localhost",
            8101,
            None,
            &PathBuf::from("/t"),
            &PathBuf::from("/t/a"),
        );
        assert_eq!(argv[2], "/extra/lib/*:/opt/druid/lib/*");
    }

    #[test]
    fn chat_handler_properties_added_only_when_enabled() {
        let mut config = base_config();
        config.separate_ingestion_endpoint = true;
        let task = base_task();
        let argv = build_argv(
            &config,
            &task,
            &Properties::new(),
            "localhost",
            8101,
            Some(8102),
            &PathBuf::from("/t"),
            &PathBuf::from("/t/a"),
        );
        assert!(argv.contains(&"-Ddruid.indexer.task.chathandler.port=8102".to_string()));
    }

    #[test]
    fn node_type_is_appended_last_when_set() {
        let config = base_config();
        let mut task = base_task();
        task.node_type = Some("middleManager".to_string());
        let argv = build_argv(
            &config,
            &task,
            &Properties::new(),
            "localhost",
            8101,
            None,
            &PathBuf::from("/t"),
            &PathBuf::from("/t/a"),
        );
        assert_eq!(argv[argv.len() - 2], "--nodeType");
        assert_eq!(argv[argv.len() - 1], "middleManager");
    }

    #[test]
    fn later_fork_property_pass_wins_on_duplicate_name() {
        let config = base_config();
        let task = base_task();
        let mut properties = Properties::new();
        properties.insert(
            "druid.indexer.fork.property.druid.server.http.numThreads".to_string(),
            "10".to_string(),
        );
        let mut task = task;
        task.context.insert(
            "druid.indexer.fork.property.druid.server.http.numThreads".to_string(),
            serde_json::Value::String("20".to_string()),
        );
        let argv = build_argv(
            &config,
            &task,
            &properties,
            "localhost",
            8101,
            None,
            &PathBuf::from("/t"),
            &PathBuf::from("/t/a"),
        );
        let positions: Vec<usize> = argv
            .iter()
            .enumerate()
            .filter(|(_, a)| a.starts_with("-Ddruid.server.http.numThreads="))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(positions.len(), 2);
        assert_eq!(argv[positions[1]], "-Ddruid.server.http.numThreads=20");
    }
}
