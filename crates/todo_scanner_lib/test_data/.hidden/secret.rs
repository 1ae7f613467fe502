// TODO: hidden
