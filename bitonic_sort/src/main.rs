fn main() {
    bitonic_sort::run();
}
