fn main() {
    torso::cli::run();
}
