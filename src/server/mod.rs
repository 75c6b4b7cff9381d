/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::prelude::*;
use tokio::net::TcpListener;

pub mod state;

pub async fn run(config: Config) -> Result<()> {
    let (axum_sender, axum_receiver) = kanal::unbounded_async::<()>();

    let info = crate::database::connect(&config).await?;
    let listener = TcpListener::bind(config.bind_address().as_str()).await?;
    info!("Listening on {}", listener.local_addr()?);

    let state = ApplicationState::new(info, config);
    let router = crate::routes::router(state);

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                axum_receiver.recv().await.ok();
            })
            .await
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => {}
        Err(error) => error!("Unable to listen for shutdown signal: {}", error),
    }

    info!("Received shutdown signal... Shutting down...");
    // shutdown
    if axum_sender.send(()).await.is_err() {
        warn!("Server already stopped");
    }

    match server.await {
        Ok(result) => result?,
        Err(error) => error!("Server task failed: {}", error),
    }

    Ok(())
}
