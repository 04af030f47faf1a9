fn main() {
    if posetrack_lib::run().is_err() {
        std::process::exit(1);
    }
}
