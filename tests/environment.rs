//! Behaviour driven by process environment: MICROPYPATH, MIP_* overrides, the log file
//! and quiet mode. One test function, since env vars are process-wide.

use std::env;

use mip_core::config::config_path_in;
use mip_core::{install_with, resolve_target, utils, InstallOptions, MemoryTransport, MipError};

fn no_target() -> InstallOptions {
    InstallOptions {
        target: None,
        ..InstallOptions::default()
    }
}

#[test]
fn environment_drives_target_config_and_logging() {
    let tmp = tempfile::tempdir().expect("tmp");
    let root = tmp.path().to_string_lossy().into_owned();
    env::remove_var("MIP_INDEX");
    env::remove_var("MIP_TARGET");
    env::remove_var("MIP_QUIET");
    env::remove_var("MIP_LOG");

    // Default target: first MICROPYPATH entry ending in /lib.
    let lib = format!("{}/lib", root);
    env::set_var("MICROPYPATH", format!(".frozen:{}:/usr/lib/micropython", lib));
    assert_eq!(resolve_target(&no_target()).expect("lib dir"), lib);

    // No /lib entry: reported as a configuration error, nothing fetched.
    env::set_var("MICROPYPATH", ".frozen:/flash");
    let transport = MemoryTransport::new();
    let err = install_with(&transport, "aioble", &no_target()).expect_err("no lib dir");
    assert!(matches!(err, MipError::Configuration { .. }), "{:?}", err);
    assert_eq!(transport.request_count(), 0);
    env::remove_var("MICROPYPATH");

    // MIP_INDEX wins over .miprc; .miprc applies once it is unset.
    std::fs::write(config_path_in(tmp.path()), r#"{"index": "https://mirror-a.test/pi"}"#)
        .expect("write .miprc");
    env::set_var("MIP_INDEX", "https://mirror-b.test/pi");
    assert_eq!(
        InstallOptions::from_env_and_config(tmp.path()).index,
        "https://mirror-b.test/pi"
    );
    env::remove_var("MIP_INDEX");
    assert_eq!(
        InstallOptions::from_env_and_config(tmp.path()).index,
        "https://mirror-a.test/pi"
    );

    // Local manifest reads are logged; quiet only silences stdout, not the log file.
    let src = tmp.path().join("src");
    std::fs::create_dir(&src).expect("mkdir");
    std::fs::write(src.join("package.json"), r#"{"urls": []}"#).expect("write manifest");
    let log_path = tmp.path().join("mip.log");
    env::set_var(utils::LOG_FILE_ENV, &log_path);

    assert!(!utils::is_quiet());
    let options = InstallOptions {
        target: Some(lib.clone()),
        quiet: true,
        ..InstallOptions::default()
    };
    let manifest = format!("file://{}/package.json", src.display());
    install_with(&MemoryTransport::new(), &manifest, &options).expect("install");
    assert!(utils::is_quiet());
    env::remove_var(utils::LOG_FILE_ENV);

    let logged = std::fs::read_to_string(&log_path).expect("log file");
    assert!(
        logged.contains(&format!("Reading manifest {}/package.json", src.display())),
        "{}",
        logged
    );
    assert!(logged.contains("Done"));
}
