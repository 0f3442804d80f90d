//! Command lines for the capture tools.

use crate::config::Config;
use std::fmt;
use std::path::Path;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(|c: char| c.is_whitespace() || c == '\'') {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Which packets survive the capture filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficFilter {
    /// Sent from a local network to the outside.
    Uplink,
    /// Sent from the outside to a local network.
    Downlink,
    /// Uplink HTTP/HTTPS only.
    UplinkWeb,
    /// Anything that is not local-to-local.
    External,
    /// ICMP that is not local-to-local.
    ExternalIcmp,
}

impl TrafficFilter {
    /// tcpdump expression for the given local networks.
    pub fn expression(&self, local_nets: &[String]) -> String {
        let nets = local_nets.join(" or ");
        let local_pair = format!("((src net {nets}) and (dst net {nets}))");

        match self {
            TrafficFilter::Uplink => format!("(src net {nets}) and not {local_pair}"),
            TrafficFilter::Downlink => format!("(dst net {nets}) and not {local_pair}"),
            TrafficFilter::UplinkWeb => {
                format!("(src net {nets}) and (port http or https) and not {local_pair}")
            }
            TrafficFilter::External => format!("not {local_pair}"),
            TrafficFilter::ExternalIcmp => format!("icmp and not {local_pair}"),
        }
    }
}

/// Program names and network settings used to build invocations.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub tcpdump: String,
    pub tcpdstat: String,
    pub ipsumdump: String,
    pub httpry: String,
    pub ipaggcreate: String,
    pub local_nets: Vec<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for Toolchain {
    fn from(config: &Config) -> Self {
        Self {
            tcpdump: config.tools.tcpdump.clone(),
            tcpdstat: config.tools.tcpdstat.clone(),
            ipsumdump: config.tools.ipsumdump.clone(),
            httpry: config.tools.httpry.clone(),
            ipaggcreate: config.tools.ipaggcreate.clone(),
            local_nets: config.network.local_nets.clone(),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Toolchain {
    /// `tcpdump <expr> -r <input> -w <output>`
    pub fn filter(&self, filter: TrafficFilter, input: &Path, output: &Path) -> Invocation {
        Invocation::new(
            &self.tcpdump,
            vec![
                filter.expression(&self.local_nets),
                "-r".to_string(),
                path_arg(input),
                "-w".to_string(),
                path_arg(output),
            ],
        )
    }

    /// `httpry -f host -r <input> -o <output>`
    pub fn http_hosts(&self, input: &Path, output: &Path) -> Invocation {
        Invocation::new(
            &self.httpry,
            vec![
                "-f".to_string(),
                "host".to_string(),
                "-r".to_string(),
                path_arg(input),
                "-o".to_string(),
                path_arg(output),
            ],
        )
    }

    /// `ipaggcreate -d -r <input> -o <output>`
    pub fn ip_aggregate(&self, input: &Path, output: &Path) -> Invocation {
        Invocation::new(
            &self.ipaggcreate,
            vec![
                "-d".to_string(),
                "-r".to_string(),
                path_arg(input),
                "-o".to_string(),
                path_arg(output),
            ],
        )
    }

    /// `ipsumdump --icmp-type-name --icmp-code-name -r <input> -o <output>`
    pub fn icmp_summary(&self, input: &Path, output: &Path) -> Invocation {
        Invocation::new(
            &self.ipsumdump,
            vec![
                "--icmp-type-name".to_string(),
                "--icmp-code-name".to_string(),
                "-r".to_string(),
                path_arg(input),
                "-o".to_string(),
                path_arg(output),
            ],
        )
    }

    /// `tcpdstat <input>`, report on stdout.
    pub fn statistics(&self, input: &Path) -> Invocation {
        Invocation::new(&self.tcpdstat, vec![path_arg(input)])
    }

    /// `tcpdump -t <icmp expr> -r <input>`, packet text on stdout.
    pub fn icmp_text(&self, input: &Path) -> Invocation {
        let mut expression = "icmp".to_string();
        for net in &self.local_nets {
            expression.push_str(&format!(" and not src net {}", net));
        }

        Invocation::new(
            &self.tcpdump,
            vec![
                "-t".to_string(),
                expression,
                "-r".to_string(),
                path_arg(input),
            ],
        )
    }
}
