fn main() {
    sceneflow_replay::cli::run();
}
