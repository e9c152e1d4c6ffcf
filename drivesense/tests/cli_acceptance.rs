use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        // Point every service at a closed local port so nothing leaves the machine.
        let config_dir = xdg_config.join("drivesense");
        fs::create_dir_all(&config_dir).expect("failed to create config dir");
        fs::write(
            config_dir.join("config.toml"),
            r#"
[services]
users_url = "http://127.0.0.1:9"
drivers_url = "http://127.0.0.1:9"
events_url = "http://127.0.0.1:9"
timeout_secs = 2
"#,
        )
        .expect("failed to write config");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn session_path(&self) -> PathBuf {
        self.xdg_state.join("drivesense/session.json")
    }

    fn sign_in_as(&self, user_id: &str) {
        let path = self.session_path();
        fs::create_dir_all(path.parent().expect("missing session parent"))
            .expect("failed to create state dir");
        fs::write(
            &path,
            format!(
                r#"{{"user_id": "{}", "signed_in_at": "2025-03-01T12:00:00Z"}}"#,
                user_id
            ),
        )
        .expect("failed to write session");
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("drivesense"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute drivesense: {e}"))
}

fn render_args(args: &[&str]) -> String {
    args.iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }
    panic!(
        "drivesense {} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        render_args(args),
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_failure(args: &[&str], output: &Output) {
    assert!(
        !output.status.success(),
        "drivesense {} unexpectedly succeeded\nstdout:\n{}",
        render_args(args),
        String::from_utf8_lossy(&output.stdout)
    );
}

#[test]
fn whoami_reports_signed_out() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["whoami"]);
    assert_success(&["whoami"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Not signed in."));
}

#[test]
fn roster_requires_sign_in() {
    let env = CliTestEnv::new();
    let args = ["drivers", "list"];

    let output = run_bin(&env, &args);
    assert_failure(&args, &output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("please sign in first"),
        "expected sign-in message, got:\n{stderr}"
    );
}

#[test]
fn whoami_and_logout_use_the_stored_session() {
    let env = CliTestEnv::new();
    env.sign_in_as("user_pat_1");

    let output = run_bin(&env, &["whoami"]);
    assert_success(&["whoami"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Signed in as user_pat_1"));

    let output = run_bin(&env, &["logout"]);
    assert_success(&["logout"], &output);
    assert!(!env.session_path().exists());

    // Signing out twice is fine.
    let output = run_bin(&env, &["logout"]);
    assert_success(&["logout"], &output);
}

#[test]
fn unreachable_roster_lists_as_empty() {
    let env = CliTestEnv::new();
    env.sign_in_as("user_pat_1");
    let args = ["drivers", "list", "--sort", "severity"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No drivers yet."));
}

#[test]
fn failed_mutation_reports_and_exits_non_zero() {
    let env = CliTestEnv::new();
    env.sign_in_as("user_pat_1");
    let args = ["drivers", "set-status", "driver_x", "severe"];

    let output = run_bin(&env, &args);
    assert_failure(&args, &output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("could not reach the server"),
        "expected connection message, got:\n{stderr}"
    );
}

#[test]
fn invalid_arguments_are_rejected() {
    let env = CliTestEnv::new();
    env.sign_in_as("user_pat_1");

    let args = ["drivers", "set-status", "driver_x", "asleep"];
    assert_failure(&args, &run_bin(&env, &args));

    let args = ["drivers", "list", "--sort", "sideways"];
    assert_failure(&args, &run_bin(&env, &args));
}

#[test]
fn signup_validates_password_length() {
    let env = CliTestEnv::new();
    let args = [
        "signup", "--name", "Pat Lee", "--email", "pat@example.com", "--password", "123",
    ];

    let output = run_bin(&env, &args);
    assert_failure(&args, &output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least 6 characters"));
    assert!(!env.session_path().exists());
}

#[test]
fn account_commands_require_sign_in() {
    let env = CliTestEnv::new();

    for args in [&["account", "show"][..], &["account", "edit", "--name", "Pat Kim"][..]] {
        let output = run_bin(&env, args);
        assert_failure(args, &output);
        assert!(String::from_utf8_lossy(&output.stderr).contains("please sign in first"));
    }
}

#[test]
fn account_edit_needs_a_field() {
    let env = CliTestEnv::new();
    env.sign_in_as("user_pat_1");
    let args = ["account", "edit"];

    let output = run_bin(&env, &args);
    assert_failure(&args, &output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("nothing to change"));
}

#[test]
fn account_edit_reports_unreachable_service() {
    let env = CliTestEnv::new();
    env.sign_in_as("user_pat_1");
    let args = ["account", "edit", "--phone", "555-0199"];

    let output = run_bin(&env, &args);
    assert_failure(&args, &output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("could not reach the server"),
        "expected connection message, got:\n{stderr}"
    );
}

#[test]
fn add_contact_needs_a_known_driver() {
    let env = CliTestEnv::new();
    env.sign_in_as("user_pat_1");
    let args = ["drivers", "add-contact", "driver_x", "--contact", "Sam Doe:555-0101"];

    let output = run_bin(&env, &args);
    assert_failure(&args, &output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("no driver with id driver_x"));
}
