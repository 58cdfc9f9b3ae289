use harrison_core::SshConfig;

/// Connection details for one build host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: Option<String>,
    pub port: u16,
    pub identity_file: Option<String>,
    pub connect_timeout: u64,
}

impl SshTarget {
    pub fn new(host: &str, config: &SshConfig) -> Self {
        let identity_file = config
            .identity_file
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| shellexpand::tilde(p).into_owned());

        Self {
            host: host.to_owned(),
            user: config.user.clone().filter(|u| !u.is_empty()),
            port: config.port,
            identity_file,
            connect_timeout: config.connect_timeout,
        }
    }

    /// `user@host`, or just `host` when no user is configured.
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    /// Arguments for `ssh` running `command` non-interactively.
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.common_options();

        if self.port != 22 {
            args.push("-p".to_owned());
            args.push(self.port.to_string());
        }

        args.push(self.destination());
        args.push(command.to_owned());
        args
    }

    /// Arguments for `scp` copying `remote_path` on the host to `local_path`.
    pub fn scp_args(&self, remote_path: &str, local_path: &str) -> Vec<String> {
        let mut args = self.common_options();

        if self.port != 22 {
            // scp uses -P (uppercase) for port
            args.push("-P".to_owned());
            args.push(self.port.to_string());
        }

        args.push(format!("{}:{remote_path}", self.destination()));
        args.push(local_path.to_owned());
        args
    }

    fn common_options(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_owned());
            args.push(identity_file.clone());
        }

        // Never prompt; a stalled connection turns into a failed command.
        args.extend([
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-o".to_owned(),
            format!("ConnectTimeout={}", self.connect_timeout),
            "-o".to_owned(),
            "ServerAliveInterval=15".to_owned(),
            "-o".to_owned(),
            "ServerAliveCountMax=3".to_owned(),
        ]);

        args
    }
}

/// Hosts that are served by running commands directly instead of over ssh.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}
