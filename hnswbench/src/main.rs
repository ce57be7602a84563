/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

mod app;

use hnswbench_runner as runner;

fn main() -> anyhow::Result<()> {
    runner::logging::init_subscriber();
    let app = app::App::parse();
    let mut output = runner::output::default();
    app.run(&mut output)
}
