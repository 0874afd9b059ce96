use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_config(&self, content: &str) {
        let path = self.root.path().join("tunnelship.yaml");
        fs::write(path, content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_file(&self, name: &str, content: &str) {
        fs::write(self.root.path().join(name), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// プロジェクトディレクトリで実行するコマンド（外部の設定は読まない）
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("tunnelship").unwrap();
        cmd.current_dir(self.path())
            .env_remove("TUNNELSHIP_CONFIG")
            .env_remove("TUNNELSHIP_SSH")
            .env_remove("TUNNELSHIP_TARGET")
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env("NO_COLOR", "1");
        cmd
    }
}
