#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct-horse";

pub fn temp_workspace() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("portal-test-")
        .tempdir()
        .expect("create temp dir")
}

/// A running daemon driven over its stdin/stdout pipes.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    events: Vec<serde_json::Value>,
}

impl Sidecar {
    pub fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    /// Spawns a daemon with extra environment on top of the test defaults.
    pub fn spawn_with_env(vars: &[(&str, &str)]) -> Self {
        let exe = env!("CARGO_BIN_EXE_portald");
        let mut command = Command::new(exe);
        command
            .env("PORTAL_ADMIN_USERNAME", ADMIN_USERNAME)
            .env("PORTAL_ADMIN_PASSWORD", ADMIN_PASSWORD)
            .env_remove("PORTAL_WORKSPACE")
            .env_remove("PORTAL_MAX_UPLOAD_BYTES")
            .env_remove("CLOUDINARY_CLOUD_NAME")
            .env_remove("CLOUDINARY_API_KEY")
            .env_remove("CLOUDINARY_API_SECRET")
            .env("RUST_LOG", "off");
        for (key, value) in vars {
            command.env(key, value);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn portald");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
            events: Vec::new(),
        }
    }

    /// Spawns a daemon with `workspace` already selected.
    pub fn with_workspace(workspace: &Path) -> Self {
        let mut sidecar = Self::spawn();
        sidecar.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        sidecar
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write raw line");
        self.stdin.flush().expect("flush raw line");
        self.read_line()
    }

    fn read_line(&mut self) -> serde_json::Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "daemon closed stdout");
        serde_json::from_str(line.trim()).expect("parse response json")
    }

    /// Sends one request and returns its response; snapshot events that
    /// arrive on the way are kept for `take_events`.
    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        loop {
            let value = self.read_line();
            if value.get("event").is_some() {
                self.events.push(value);
                continue;
            }
            assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
            return value;
        }
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let resp = self.request(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            resp
        );
        resp.get("result").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// Sends a request that must fail and returns its error code.
    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let resp = self.request(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            resp
        );
        resp.pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    pub fn login_admin(&mut self) {
        self.ok(
            "auth.adminLogin",
            json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }),
        );
    }

    /// Flushes events still in the pipe behind a `health` round trip.
    pub fn take_events(&mut self) -> Vec<serde_json::Value> {
        self.ok("health", json!({}));
        std::mem::take(&mut self.events)
    }

    pub fn upsert_user(&mut self, uid: &str) -> serde_json::Value {
        self.ok(
            "users.upsert",
            json!({ "uid": uid, "email": format!("{uid}@school.test") }),
        )
    }

    /// Makes `a` and `b` friends and returns the friendship id.
    pub fn befriend(&mut self, a: &str, b: &str) -> String {
        let request = self.ok(
            "friendRequests.send",
            json!({ "userId": a, "toUserId": b }),
        );
        let request_id = request["id"].as_str().expect("request id").to_string();
        let accepted = self.ok(
            "friendRequests.accept",
            json!({ "userId": b, "requestId": request_id }),
        );
        accepted["friendship"]["id"]
            .as_str()
            .expect("friendship id")
            .to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
