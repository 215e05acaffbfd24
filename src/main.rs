fn main() -> Result<(), Box<dyn std::error::Error>> {
    repcoach::cli::main()
}
