mod transcript_test;
