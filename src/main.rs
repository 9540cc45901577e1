// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use kube::CustomResourceExt;
use operator::types::v1alpha1::control_plane::AWSManagedControlPlane;
use operator::types::v1alpha1::machine_pool::AWSMachinePool;
use shadow_rs::{formatcp, shadow};
use std::pin::Pin;
use tokio::io::{AsyncWrite, AsyncWriteExt};

shadow!(build);

const LONG_VERSION: &str = formatcp!(
    "{} ({} {})\nbuilt {} with {}",
    build::PKG_VERSION,
    build::BRANCH,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION
);

#[derive(Parser)]
#[command(name = "capa-op")]
#[command(about = "AWS machine pool and EKS control plane operator CLI", long_about = None)]
#[command(version = build::PKG_VERSION, long_version = LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Output CRDs in YAML
    Crd {
        /// Optional output path. If not set, the output will be written to stdout.
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crd { file } => {
            let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
                Box::pin(
                    tokio::fs::OpenOptions::new()
                        .create(true)
                        .truncate(true)
                        .write(true)
                        .open(file)
                        .await?,
                )
            } else {
                Box::pin(tokio::io::stdout())
            };

            let documents = [
                serde_yaml_ng::to_string(&AWSMachinePool::crd())?,
                serde_yaml_ng::to_string(&AWSManagedControlPlane::crd())?,
            ];
            writer
                .write_all(documents.join("---\n").as_bytes())
                .await?;
            writer.flush().await?;
        }
    }

    Ok(())
}
