use super::*;
use figment::Jail;
use serde_json::json;

fn load(jail: &mut Jail, custom: Option<&str>) -> figment::Result<Settings> {
    let home = jail.directory().to_path_buf();
    jail.set_env("HOME", home.display());
    let config = BasicToolsConfig::load(custom, None::<&()>).map_err(|e| e.to_string())?;
    config.settings().map_err(|e| format!("{e:#}").into())
}

#[test]
fn test_config_loads_defaults() {
    Jail::expect_with(|jail| {
        let settings = load(jail, None)?;

        assert_eq!(settings.parallel.workers, WorkerCount::AllPhysical);
        assert!(settings.parallel.verbose);
        assert_eq!(settings.parallel.unit, "it");
        assert_eq!(settings.logging.level_filter().map_err(|e| e.to_string())?, LevelFilter::INFO);
        assert!(settings.logging.log_dir().is_none());
        assert_eq!(settings.lock.path, PathBuf::from("./lock.lck"));
        assert_eq!(settings.lock.wait_ms, 100);
        assert_eq!(settings.run_output.filename, "run_output");
        assert_eq!(settings.run_output.file_column, "_file");
        Ok(())
    });
}

#[test]
fn test_repo_file_overrides_user_file() {
    Jail::expect_with(|jail| {
        std::fs::create_dir_all(jail.directory().join(".config/basictools"))
            .map_err(|e| e.to_string())?;
        jail.create_file(
            ".config/basictools/config.toml",
            "[parallel]\nworkers = 3\nunit = \"runs\"",
        )?;
        jail.create_file("basictools.toml", "[parallel]\nworkers = \"logical\"")?;

        let settings = load(jail, None)?;
        assert_eq!(settings.parallel.workers, WorkerCount::AllLogical);
        assert_eq!(settings.parallel.unit, "runs");
        Ok(())
    });
}

#[test]
fn test_custom_file_by_extension() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.json", r#"{"lock": {"wait_ms": 5, "process_name": "etl"}}"#)?;
        jail.create_file("custom.yaml", "logging:\n  level: debug\n  root_dir: ./out\n")?;

        let settings = load(jail, Some("custom.json"))?;
        assert_eq!(settings.lock.wait_ms, 5);
        assert_eq!(settings.lock.process_name, "etl");

        let settings = load(jail, Some("custom.yaml"))?;
        assert_eq!(settings.logging.level_filter().map_err(|e| e.to_string())?, LevelFilter::DEBUG);
        assert_eq!(settings.logging.log_dir(), Some(Path::new("./out")));
        Ok(())
    });
}

#[test]
fn test_env_beats_files_and_cli_beats_env() {
    Jail::expect_with(|jail| {
        jail.create_file("basictools.toml", "[parallel]\nworkers = 8")?;
        jail.set_env("BASICTOOLS_PARALLEL__WORKERS", "-1");
        jail.set_env("BASICTOOLS_RUN_OUTPUT__SAVE_EVERY_SET", "false");

        let settings = load(jail, None)?;
        assert_eq!(settings.parallel.workers, WorkerCount::AllLogical);
        assert!(!settings.run_output.save_every_set);

        let config = BasicToolsConfig::load(None, Some(json!({"parallel": {"workers": "inline"}})))
            .map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.parallel.workers, WorkerCount::Inline);
        Ok(())
    });
}

#[test]
fn test_invalid_worker_count_is_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("BASICTOOLS_PARALLEL__WORKERS", "-5");
        assert!(load(jail, None).is_err());
        Ok(())
    });
}

#[test]
fn test_sections_and_full_config() {
    Jail::expect_with(|jail| {
        let home = jail.directory().to_path_buf();
        jail.set_env("HOME", home.display());
        let config = BasicToolsConfig::load(None, None::<&()>).map_err(|e| e.to_string())?;

        let lock = config.get_section("lock").map_err(|e| e.to_string())?;
        assert_eq!(lock["process_name"], json!("process"));
        assert_eq!(
            config.get_section("run_output.filename").map_err(|e| e.to_string())?,
            json!("run_output")
        );
        assert!(config.get_section("missing.key").is_err());

        let full = config.get_full_config().map_err(|e| e.to_string())?;
        for section in ["parallel", "logging", "lock", "run_output"] {
            assert!(full.get(section).is_some(), "missing section {section}");
        }
        Ok(())
    });
}

#[test]
fn test_lock_settings_build_file_lock() {
    Jail::expect_with(|jail| {
        jail.create_file("basictools.toml", "[lock]\npath = \"jobs.lck\"")?;
        let settings = load(jail, None)?;
        let lock = settings.lock.file_lock();
        assert_eq!(lock.path(), Path::new("jobs.lck"));
        Ok(())
    });
}
